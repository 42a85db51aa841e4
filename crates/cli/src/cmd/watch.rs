//! Watch command implementation
//!
//! Poll a directory and re-run a command whenever something below it changes.

use clap::Args;
use rcm_core::path::AbsPath;
use rcm_engine::fingerprint::CompareMode;
use rcm_engine::watch::{WatchParams, stop_on_ctrl_c, watch};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::info;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};

/// Re-run a command on changes below a directory
#[derive(Debug, Clone, Args)]
pub struct WatchCommand {
    /// Directory to watch
    pub directory: PathBuf,

    /// Command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub cmd: Vec<String>,

    /// Seconds between polls
    #[arg(short, long, default_value_t = 0.1)]
    pub poll_rate: f64,

    /// Run the command through `sh -c`
    #[arg(short, long)]
    pub shell: bool,

    /// Poll once and exit
    #[arg(short = 'i', long)]
    pub single_pass: bool,

    /// Only react to files appearing or disappearing
    #[arg(short, long)]
    pub no_change: bool,
}

impl WatchCommand {
    fn params(&self) -> Result<WatchParams> {
        let poll_rate = Duration::try_from_secs_f64(self.poll_rate).map_err(|e| {
            CommandError::InvalidArgument(format!("poll rate {}: {e}", self.poll_rate))
        })?;

        Ok(WatchParams {
            directory: AbsPath::current_dir_join(&self.directory)?.into_path_buf(),
            command: self.cmd.clone(),
            compare: if self.no_change {
                CompareMode::Presence
            } else {
                CompareMode::Contents
            },
            shell: self.shell,
            single_pass: self.single_pass,
            poll_rate,
        })
    }
}

impl Command for WatchCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let params = self.params()?;
        let cache_file = context.paths.watch_cache(std::process::id());
        let stop = Arc::new(AtomicBool::new(false));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let runs = runtime.block_on(async {
            stop_on_ctrl_c(Arc::clone(&stop));
            watch(&params, cache_file, stop).await
        })?;

        info!("Command ran {} time(s).", runs);
        Ok(())
    }
}
