//! Error types for Quire operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across the editing engine. Uses `thiserror` for derive macros.
//!
//! Most editing paths never surface these to the host: transcoding errors
//! become fallback output plus a warning, and persistence errors become
//! save-state transitions. The type still exists so the internal pipeline
//! can propagate failures with `?` up to the point where they are absorbed.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in Quire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Markdown or markup could not be converted.
    #[error("Transcoding error: {0}")]
    Transcode(String),

    /// The persistence collaborator rejected a call.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The persistence collaborator did not answer in time.
    #[error("Persistence call timed out after {0:?}")]
    Timeout(Duration),

    /// The edit surface refused a capability call.
    #[error("Edit surface error: {0}")]
    Platform(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io_with_path(err: std::io::Error, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {err}", path.display()),
        ))
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transcoding error.
    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    /// Create a persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an edit surface error.
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Whether a later attempt of the same operation may succeed.
    ///
    /// Persistence failures and timeouts are transient from the editor's
    /// point of view; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Timeout(_) | Self::Io(_))
    }
}

/// Result type alias using Quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;
