//! Variant command implementation

use clap::Args;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Name selected by `--default`
pub const DEFAULT_VARIANT: &str = "default";

/// Set or show the active variant
#[derive(Debug, Clone, Args)]
pub struct VariantCommand {
    /// Variant to select (shows the current one if omitted)
    pub name: Option<String>,

    /// Select the `default` variant
    #[arg(long, conflicts_with = "name")]
    pub default: bool,
}

impl Command for VariantCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let mut state = context.load_state()?;

        let name = if self.default {
            Some(DEFAULT_VARIANT)
        } else {
            self.name.as_deref()
        };

        if state.set_variant(name) {
            context.store.save(&state)?;
        } else if name.is_none() {
            println!("{}", state.variant());
        }
        Ok(())
    }
}
