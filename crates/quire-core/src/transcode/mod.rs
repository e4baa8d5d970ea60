//! Media-preserving transcoder.
//!
//! Converts between markdown and markup in both directions. Inline base64
//! images survive the markdown renderer through a placeholder side-table
//! (see [`media`]). Neither direction ever fails from the caller's point of
//! view: a conversion error falls back to the original text wrapped as one
//! opaque block, and the problem is reported as a [`TranscodeWarning`].
//!
//! # Example
//!
//! ```
//! use quire_core::transcode::Transcoder;
//!
//! let transcoder = Transcoder::default();
//! let out = transcoder.markdown_to_markup("# Hello", "draft");
//! assert_eq!(out.markup.trim(), "<h1>Hello</h1>");
//!
//! let back = transcoder.markup_to_markdown(&out.markup);
//! assert_eq!(back.markdown, "# Hello");
//! assert!(!back.media_mismatch_warning);
//! ```

pub mod forward;
pub mod media;
pub mod reverse;

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
pub use media::{MediaDiagnostic, MediaPlaceholder, PlaceholderTable};

/// Conversion direction, for warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Markdown to markup.
    ToMarkup,
    /// Markup to markdown.
    ToMarkdown,
}

/// A non-fatal problem found while transcoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscodeWarning {
    /// The converter failed and the original text was kept verbatim.
    Fallback {
        /// Which way the conversion was going.
        direction: Direction,
        /// Why it failed.
        reason: String,
    },
    /// Markup held a different number of images than the markdown output.
    MediaMismatch {
        /// `<img>` elements in the input markup.
        markup_count: usize,
        /// Image directives in the output markdown.
        markdown_count: usize,
    },
}

impl std::fmt::Display for TranscodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fallback { direction, reason } => {
                let dir = match direction {
                    Direction::ToMarkup => "markdown to markup",
                    Direction::ToMarkdown => "markup to markdown",
                };
                write!(f, "{dir} conversion failed, original text kept: {reason}")
            }
            Self::MediaMismatch {
                markup_count,
                markdown_count,
            } => write!(
                f,
                "markup has {markup_count} image(s) but markdown has {markdown_count}"
            ),
        }
    }
}

/// Result of a markdown to markup conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardOutput {
    /// Rendered markup.
    pub markup: String,
    /// Inline images that made it into the output.
    pub recovered_media_count: usize,
    /// Inline images dropped by the integrity guard.
    pub dropped_count: usize,
    /// One record per dropped image.
    pub diagnostics: Vec<MediaDiagnostic>,
    /// Non-fatal problems.
    pub warnings: Vec<TranscodeWarning>,
}

/// Result of a markup to markdown conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseOutput {
    /// Markdown text.
    pub markdown: String,
    /// Image counts differ between input and output.
    pub media_mismatch_warning: bool,
    /// Non-fatal problems.
    pub warnings: Vec<TranscodeWarning>,
}

/// Bidirectional converter with a configured integrity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    min_media_payload: usize,
}

impl Transcoder {
    /// Create a transcoder that drops payloads shorter than
    /// `min_media_payload` characters.
    pub fn new(min_media_payload: usize) -> Self {
        Self { min_media_payload }
    }

    /// Create a transcoder from editor configuration.
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.min_media_payload)
    }

    /// The integrity threshold.
    pub fn min_media_payload(&self) -> usize {
        self.min_media_payload
    }

    /// Convert markdown to markup, protecting inline media.
    ///
    /// `article_id` only labels diagnostics.
    pub fn markdown_to_markup(&self, text: &str, article_id: &str) -> ForwardOutput {
        match forward::render(text, article_id, self.min_media_payload) {
            Ok(out) => out,
            Err(err) => {
                tracing::warn!(
                    article_id,
                    error = %err,
                    "Markdown conversion failed, keeping raw text"
                );
                forward::fallback(text, &err)
            }
        }
    }

    /// Convert markup to markdown.
    pub fn markup_to_markdown(&self, text: &str) -> ReverseOutput {
        match reverse::convert(text) {
            Ok(converted) => {
                let found = reverse::count_output_images(&converted.markdown);
                let mut warnings = Vec::new();
                let mismatch = found != converted.images_in;
                if mismatch {
                    tracing::warn!(
                        markup_count = converted.images_in,
                        markdown_count = found,
                        "Image count changed during markup conversion"
                    );
                    warnings.push(TranscodeWarning::MediaMismatch {
                        markup_count: converted.images_in,
                        markdown_count: found,
                    });
                }
                ReverseOutput {
                    markdown: converted.markdown,
                    media_mismatch_warning: mismatch,
                    warnings,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Markup conversion failed, keeping raw markup");
                ReverseOutput {
                    markdown: text.to_string(),
                    media_mismatch_warning: false,
                    warnings: vec![TranscodeWarning::Fallback {
                        direction: Direction::ToMarkdown,
                        reason: err.to_string(),
                    }],
                }
            }
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

/// [`Transcoder::markdown_to_markup`] with default settings.
pub fn markdown_to_markup(text: &str) -> ForwardOutput {
    Transcoder::default().markdown_to_markup(text, "unsaved")
}

/// [`Transcoder::markup_to_markdown`] with default settings.
pub fn markup_to_markdown(text: &str) -> ReverseOutput {
    Transcoder::default().markup_to_markdown(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> String {
        "R0lG".repeat(len / 4 + 1)[..len].to_string()
    }

    #[test]
    fn test_scenario_media_recovered() {
        let p = payload(80);
        let out = markdown_to_markup(&format!("![Diagram](data:image/png;base64,{p})"));
        assert_eq!(out.recovered_media_count, 1);
        assert_eq!(out.markup.matches("<img").count(), 1);
        assert!(out.markup.contains(&p));
        assert!(out.markup.contains("<figcaption>Diagram</figcaption>"));
    }

    #[test]
    fn test_scenario_media_dropped() {
        let p = payload(30);
        let out = markdown_to_markup(&format!("![Diagram](data:image/png;base64,{p})"));
        assert_eq!(out.dropped_count, 1);
        assert_eq!(out.recovered_media_count, 0);
        assert!(!out.markup.contains("<img"));
        assert!(!out.markup.contains(&p));
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let p = payload(30);
        let out = Transcoder::new(10)
            .markdown_to_markup(&format!("![x](data:image/png;base64,{p})"), "a");
        assert_eq!(out.recovered_media_count, 1);
    }

    #[test]
    fn test_round_trip_media() {
        let p = payload(120);
        let source = format!("# Title\n\nIntro text.\n\n![Chart](data:image/png;base64,{p})");
        let markup = markdown_to_markup(&source).markup;
        let back = markup_to_markdown(&markup);
        assert_eq!(back.markdown, source);
        assert!(!back.media_mismatch_warning);
    }

    #[test]
    fn test_mismatch_is_reported() {
        let back = markup_to_markdown("<pre><img src=\"a.png\"></pre>");
        assert!(back.media_mismatch_warning);
        assert!(matches!(
            back.warnings[0],
            TranscodeWarning::MediaMismatch {
                markup_count: 1,
                markdown_count: 0
            }
        ));
    }

    #[test]
    fn test_reverse_fallback_keeps_markup() {
        let deep = format!("{}x{}", "<div>".repeat(400), "</div>".repeat(400));
        let back = markup_to_markdown(&deep);
        assert_eq!(back.markdown, deep);
        assert!(matches!(
            back.warnings[0],
            TranscodeWarning::Fallback {
                direction: Direction::ToMarkdown,
                ..
            }
        ));
    }

    #[test]
    fn test_warning_display() {
        let warning = TranscodeWarning::MediaMismatch {
            markup_count: 2,
            markdown_count: 1,
        };
        assert_eq!(warning.to_string(), "markup has 2 image(s) but markdown has 1");
    }
}
