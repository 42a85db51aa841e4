//! Dump command implementation
//!
//! Print the rendering context the engine would use, without applying.

use clap::Args;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};

/// Print the rendering context as JSON
#[derive(Debug, Clone, Args)]
pub struct DumpCommand {}

impl Command for DumpCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let engine = context.engine()?;
        let json = serde_json::to_string_pretty(engine.context()?)
            .map_err(|e| CommandError::InvalidArgument(format!("context is not serializable: {e}")))?;
        println!("{json}");
        Ok(())
    }
}
