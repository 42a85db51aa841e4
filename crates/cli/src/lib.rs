//! rcm CLI library
//!
//! This library contains all the CLI logic for rcm, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use command::Command;
use common::RuntimeContext;

/// rcm - a template-driven dotfile reconciler
#[derive(Parser)]
#[command(name = "rcm")]
#[command(about = "Render and install dotfiles from a data repository")]
#[command(version)]
#[command(long_about = "Render and install dotfiles from a data repository

A data repository holds a manifest, templates, variables and configs.
rcm renders each managed file, copies or links it into place, and only
touches outputs whose inputs changed since the last run.")]
pub struct Cli {
    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "RCM_LOG_FILE", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the rcm CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Materialise managed files that are out of date
    Apply(cmd::apply::ApplyCommand),

    /// Set or show the active data repository
    Use(cmd::directory::UseCommand),

    /// Set or show the active variant
    Variant(cmd::variant::VariantCommand),

    /// Re-run a command whenever files below a directory change
    Watch(cmd::watch::WatchCommand),

    /// Print the rendering context as JSON
    Dump(cmd::dump::DumpCommand),
}

/// Execute the command, returning the process exit code
fn execute_command(command: &Commands, context: &RuntimeContext) -> error::Result<i32> {
    match command {
        Commands::Apply(apply_cmd) => apply_cmd.execute(context),
        Commands::Use(use_cmd) => use_cmd.execute(context).map(|()| 0),
        Commands::Variant(variant_cmd) => variant_cmd.execute(context).map(|()| 0),
        Commands::Watch(watch_cmd) => watch_cmd.execute(context).map(|()| 0),
        Commands::Dump(dump_cmd) => dump_cmd.execute(context).map(|()| 0),
    }
}

/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - The XDG base directories cannot be determined
/// - Command execution fails
pub fn run(cli: Cli) -> Result<i32> {
    rcm_config::logging::init(cli.verbose, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let context = RuntimeContext::from_env().context("Failed to resolve base directories")?;

    execute_command(&cli.command, &context).map_err(|e| {
        if e.is_internal() {
            tracing::error!("{e}");
        }
        anyhow::Error::new(e)
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from(["rcm", "apply", "--force", "-n"]).unwrap();
        let Commands::Apply(apply) = cli.command else {
            panic!("expected apply");
        };
        assert!(apply.force);
        assert!(apply.dry_run);
    }

    #[test]
    fn test_parse_watch_trailing_command() {
        let cli = Cli::try_parse_from([
            "rcm", "watch", "-p", "2", "-s", "src", "cargo", "test", "--all",
        ])
        .unwrap();
        let Commands::Watch(watch) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(watch.directory, PathBuf::from("src"));
        assert_eq!(watch.cmd, ["cargo", "test", "--all"]);
        assert!(watch.shell);
        assert!((watch.poll_rate - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_watch_requires_command() {
        assert!(Cli::try_parse_from(["rcm", "watch", "src"]).is_err());
    }

    #[test]
    fn test_use_default_conflicts_with_directory() {
        assert!(Cli::try_parse_from(["rcm", "use", "--default", "/tmp"]).is_err());
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["rcm", "dump", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Dump(_)));
    }
}
