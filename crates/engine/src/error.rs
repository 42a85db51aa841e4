//! Error types for rcm-engine
//!
//! The variants follow how far a failure reaches: loading failures stop the
//! whole invocation, per-file failures are collected by the engine and
//! counted, and [`Error::Invariant`] marks an inconsistency that is never a
//! usage error.

use crate::condition::ConditionError;
use rcm_core::path::AbsPath;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rcm-engine operations
pub type Result<T> = std::result::Result<T, Error>;

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Main error type for rcm-engine
#[derive(Error, Debug)]
pub enum Error {
    /// No manifest exists in the data repository
    #[error("No config found (tried {})", format_candidates(candidates))]
    ConfigNotFound {
        /// Every manifest path that was tried
        candidates: Vec<PathBuf>,
    },

    /// Internal consistency violation
    #[error("Internal error: {0}")]
    Invariant(String),

    /// A managed file names a template that does not exist
    #[error("Template for '{name}' not found")]
    TemplateNotFound {
        /// Logical template name
        name: String,
    },

    /// A template still referenced by the manifest was deleted
    #[error("Template '{name}' ({}) was removed but is needed", path.display())]
    TemplateRemoved {
        /// Logical template name
        name: String,
        /// Last known source of the template
        path: PathBuf,
    },

    /// Rendering a template failed
    #[error("Template rendering failed for '{name}': {message}")]
    Render {
        /// Logical template name
        name: String,
        /// Renderer message
        message: String,
    },

    /// A managed file's condition could not be evaluated
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A data document could not be decoded
    #[error("Failed to decode {}: {message}", path.display())]
    Decode {
        /// Document that failed to decode
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// Invalid manifest or configuration content
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error writing a file
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        /// Path the operation targeted
        path: AbsPath,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Error creating a directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path the operation targeted
        path: AbsPath,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Error removing a file
    #[error("Failed to remove {path}: {source}")]
    Remove {
        /// Path the operation targeted
        path: AbsPath,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// State persistence error
    #[error("State persistence error: {0}")]
    State(String),

    /// Path is not absolute
    #[error("Path must be absolute: {}", path.display())]
    PathNotAbsolute {
        /// The offending path
        path: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    Other {
        /// What was being done
        context: String,
        /// The wrapped error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// Convert from rcm_core::Error
impl From<rcm_core::Error> for Error {
    fn from(err: rcm_core::Error) -> Self {
        match err {
            rcm_core::Error::Io(e) => Error::Io(e),
            rcm_core::Error::PathNotAbsolute { path } => Error::PathNotAbsolute { path },
            rcm_core::Error::Decode { path, message } => Error::Decode { path, message },
            rcm_core::Error::Config(message) => Error::Config(message),
            rcm_core::Error::State(message) => Error::State(message),
            other => Error::Other {
                context: "Shared error".to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl Error {
    /// Create an error with additional context
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Other {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error marks an internal-consistency violation
    pub fn is_invariant(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
