//! Diagnostics CLI for the Quire editing engine.
//!
//! # Modules
//!
//! - [`cli`]: clap argument types
//! - [`config`]: [`QuireConfig`] loading via confyg
//! - [`config_handlers`]: `quire config` subcommands
//! - [`content_handlers`]: `quire classify` and `quire transcode`
//! - [`app`]: logging setup and command dispatch

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod content_handlers;

pub use app::{QuireCli, init_logging};
pub use cli::CliArgs;
pub use config::QuireConfig;
