//! Quire Core: the rich-content synchronization engine behind the article
//! editor.
//!
//! Canonical article content is a single markup string. Three surfaces
//! (direct editing, markdown source and markup source) are views derived
//! from it; edits flow back through a media-preserving transcoder, and a
//! debounced autosave loop persists the result without ever losing an
//! update.
//!
//! # Modules
//!
//! - [`classify`]: markdown-or-markup heuristic for stored content
//! - [`transcode`]: markdown and markup conversion that keeps inline images
//! - [`surface`]: the three surfaces and their derivation caches
//! - [`autosave`]: debounced, serialized persistence
//! - [`blocks`]: slash-command block insertion
//! - [`session`]: one open article, tying the above together
//! - [`store`] and [`platform`]: collaborators supplied by the host
//!
//! # Example
//!
//! ```
//! use quire_core::{Format, classify, markdown_to_markup};
//!
//! let source = "# Notes\n\n![Diagram](data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk)";
//! assert_eq!(classify(source), Format::Markdown);
//!
//! let out = markdown_to_markup(source);
//! assert_eq!(out.recovered_media_count, 1);
//! assert!(out.markup.contains("<figcaption>Diagram</figcaption>"));
//! ```

pub mod article;
pub mod autosave;
pub mod blocks;
pub mod classify;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod store;
pub mod surface;
pub mod transcode;

// Re-export key types at crate root for convenience
pub use article::{Article, ArticleStatus};
pub use autosave::{AutosaveHandle, Autosaver, SaveState, SaveStatus};
pub use blocks::{BlockCatalog, BlockKind, BlockMenu, BlockTemplate, MenuKey, MenuOutcome};
pub use classify::{Classification, Format, classify, classify_detailed};
pub use config::EditorConfig;
pub use error::{Error, Result};
pub use platform::{CaretPosition, EditSurface, MockEditSurface};
pub use session::{EditorSession, LoadReport};
pub use store::{ArticleStore, CreateReceipt, MockArticleStore, SaveReceipt};
pub use surface::{MutationReport, Surface, SurfaceSync, SwitchReport};
pub use transcode::{
    ForwardOutput, MediaDiagnostic, ReverseOutput, TranscodeWarning, Transcoder,
    markdown_to_markup, markup_to_markdown,
};
