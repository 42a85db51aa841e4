//! Command trait for the rcm CLI
//!
//! Every subcommand implements [`Command`]. The `execute` method receives a
//! [`RuntimeContext`] holding the resolved XDG paths and the state store.

use crate::common::RuntimeContext;
use crate::error::Result;

/// Trait for all rcm commands
pub trait Command {
    /// The type returned by this command
    ///
    /// `apply` returns its exit code, most other commands return `()`.
    type Output;

    /// Execute the command with the given runtime context
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
