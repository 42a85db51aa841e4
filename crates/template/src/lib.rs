//! # rcm Template
//!
//! Template engine integration for rcm using minijinja.
//!
//! This crate provides template rendering with custom functions for
//! accessing system information and environment variables, and implements
//! [`rcm_core::TemplateRenderer`] so the engine can render through it.

pub mod context;
pub mod engine;
pub mod functions;

pub use context::{SystemInfo, TemplateContext};
pub use engine::TemplateEngine;

use thiserror::Error;

/// Result type for template operations
pub type Result<T> = std::result::Result<T, Error>;

/// Template engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Template rendering error
    #[error("Template error at {location}: {message}")]
    Render {
        /// Template name and line, when known
        location: String,
        /// minijinja's message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        let location = match (err.name(), err.line()) {
            (Some(name), Some(line)) => format!("{name} line {line}"),
            (Some(name), None) => name.to_string(),
            (None, Some(line)) => format!("line {line}"),
            (None, None) => "unknown location".to_string(),
        };

        Error::Render {
            location,
            message: err.to_string(),
        }
    }
}

impl From<Error> for rcm_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => rcm_core::Error::Io(e),
            other @ Error::Render { .. } => rcm_core::Error::Render(other.to_string()),
        }
    }
}
