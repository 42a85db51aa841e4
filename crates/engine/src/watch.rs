//! Polling directory watcher
//!
//! Re-runs a command whenever files below a directory appear, disappear or
//! change. Each process gets its own fingerprint cache, removed when the
//! loop ends.

use crate::error::{Error, Result};
use crate::fingerprint::{CompareMode, FingerprintCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default delay between polls
pub const DEFAULT_POLL_RATE: Duration = Duration::from_millis(100);

/// Parameters of one watch session
#[derive(Debug, Clone)]
pub struct WatchParams {
    /// Directory polled recursively
    pub directory: PathBuf,
    /// Program and arguments, or shell words when `shell` is set
    pub command: Vec<String>,
    /// What counts as a change
    pub compare: CompareMode,
    /// Run through `sh -c`
    pub shell: bool,
    /// Stop after the first poll
    pub single_pass: bool,
    /// Delay between polls
    pub poll_rate: Duration,
}

impl WatchParams {
    /// Watch `directory` with default settings
    pub fn new(directory: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            command,
            compare: CompareMode::Contents,
            shell: false,
            single_pass: false,
            poll_rate: DEFAULT_POLL_RATE,
        }
    }

    fn to_command(&self) -> Result<Command> {
        if self.shell {
            let mut command = Command::new("sh");
            command.arg("-c").arg(self.command.join(" "));
            return Ok(command);
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::Config("watch needs a command to run".to_string()))?;
        let mut command = Command::new(program);
        command.args(args);
        Ok(command)
    }
}

/// Set `stop` once Ctrl-C is received
pub fn stop_on_ctrl_c(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping.");
            stop.store(true, Ordering::SeqCst);
        }
    });
}

/// Poll until `stop` is set (or once, for a single pass)
///
/// Returns how many times the command ran. The cache at `cache_file` is
/// deleted afterwards, also when polling fails.
pub async fn watch(params: &WatchParams, cache_file: PathBuf, stop: Arc<AtomicBool>) -> Result<usize> {
    let mut cache = FingerprintCache::load(cache_file, params.compare);
    let result = poll_loop(params, &mut cache, &stop).await;
    cache.discard()?;
    result
}

async fn poll_loop(
    params: &WatchParams,
    cache: &mut FingerprintCache,
    stop: &AtomicBool,
) -> Result<usize> {
    let mut runs = 0;

    while !stop.load(Ordering::SeqCst) {
        let mut count = cache.poll_directory(&params.directory, |change| {
            debug!("{:?}: '{}'", change.kind, change.path.display());
            true
        })?;
        count += cache.poll_existing(|_| true)?;

        if count > 0 {
            info!("{} change(s), running command.", count);
            let status = params.to_command()?.status().await?;
            if !status.success() {
                warn!("Command exited with {}", status);
            }
            runs += 1;
            cache.save()?;
        }

        if params.single_pass {
            break;
        }
        tokio::time::sleep(params.poll_rate).await;
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn params(temp: &TempDir, marker: &std::path::Path) -> WatchParams {
        let dir = temp.path().join("watched");
        fs::create_dir_all(&dir).unwrap();
        let mut params = WatchParams::new(
            dir,
            vec!["echo".to_string(), "ran".to_string(), ">>".to_string(), marker.display().to_string()],
        );
        params.shell = true;
        params.single_pass = true;
        params
    }

    #[tokio::test]
    async fn test_single_pass_runs_on_new_files() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("marker");
        let params = params(&temp, &marker);
        fs::write(params.directory.join("file"), "x").unwrap();
        let cache_file = temp.path().join("cache.json");

        let runs = watch(&params, cache_file.clone(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(runs, 1);
        assert_eq!(fs::read_to_string(&marker).unwrap(), "ran\n");
        assert!(!cache_file.exists());
    }

    #[tokio::test]
    async fn test_empty_directory_does_not_run() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("marker");
        let params = params(&temp, &marker);

        let runs = watch(&params, temp.path().join("cache.json"), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(runs, 0);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_stop_flag_checked_before_polling() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("marker");
        let mut params = params(&temp, &marker);
        params.single_pass = false;
        fs::write(params.directory.join("file"), "x").unwrap();

        let runs = watch(&params, temp.path().join("cache.json"), Arc::new(AtomicBool::new(true)))
            .await
            .unwrap();

        assert_eq!(runs, 0);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let params = WatchParams::new("/tmp", Vec::new());
        assert!(params.to_command().is_err());
    }
}
