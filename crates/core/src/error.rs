//! Base error types for rcm
//!
//! This module provides the foundation error types that all crates can use.

use std::path::PathBuf;
use thiserror::Error;

/// Base error type for shared functionality
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path is not absolute
    #[error("Path must be absolute: {}", path.display())]
    PathNotAbsolute {
        /// The offending path
        path: PathBuf,
    },

    /// A data document could not be decoded
    #[error("Failed to decode {}: {message}", path.display())]
    Decode {
        /// Document that failed to decode
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// Invalid configuration content
    #[error("Configuration error: {0}")]
    Config(String),

    /// State persistence error
    #[error("State error: {0}")]
    State(String),

    /// Template rendering error surfaced through [`crate::TemplateRenderer`]
    #[error("Render error: {0}")]
    Render(String),

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Build a [`Error::Decode`] for `path`
    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
