//! Error types for CLI commands

use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Reconciliation engine failure
    #[error(transparent)]
    Engine(#[from] rcm_engine::Error),

    /// Shared path, decode or config failure
    #[error(transparent)]
    Core(#[from] rcm_core::Error),

    /// Invalid command-line value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CommandError {
    /// Whether this is an internal-consistency violation rather than a user error
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_invariant())
    }
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;
