//! Apply command implementation
//!
//! Bring every managed file up to date with the active data repository.

use clap::Args;
use rcm_engine::ApplyOptions;
use tracing::debug;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::stats::{ApplyStats, print_failures};

/// Materialise stale managed files
#[derive(Debug, Clone, Args)]
pub struct ApplyCommand {
    /// Re-materialise every file, stale or not
    #[arg(short, long)]
    pub force: bool,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl Command for ApplyCommand {
    /// Number of files that failed
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let mut engine = context.engine()?;
        let options = ApplyOptions {
            force: self.force,
            dry_run: self.dry_run,
        };
        debug!(?options, "Applying");

        let report = engine.apply(options, &context.store)?;

        print_failures(&report);
        ApplyStats::from_report(&report).print_summary(self.dry_run);
        Ok(report.exit_code())
    }
}
