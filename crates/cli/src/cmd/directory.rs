//! Use command implementation
//!
//! Select which data repository the engine reads.

use clap::Args;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Set or show the active data repository
#[derive(Debug, Clone, Args)]
pub struct UseCommand {
    /// Data repository to use (shows the current one if omitted)
    #[arg(value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Go back to the default repository
    #[arg(long, conflicts_with = "directory")]
    pub default: bool,
}

impl Command for UseCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let mut state = context.load_state()?;

        let target = if self.default {
            Some(context.store.default_directory().to_path_buf())
        } else {
            self.directory.clone()
        };

        match target {
            Some(directory) => {
                if state.set_directory(&directory)? {
                    context.store.save(&state)?;
                }
            }
            None => println!("{}", state.directory().display()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use rcm_config::PathConfig;
    use tempfile::TempDir;

    #[test]
    fn test_use_saves_absolute_directory() {
        let temp = TempDir::new().unwrap();
        let context = RuntimeContext::new(PathConfig::under(temp.path()));
        let repo = temp.path().join("dotfiles");
        std::fs::create_dir_all(&repo).unwrap();

        UseCommand {
            directory: Some(repo.clone()),
            default: false,
        }
        .execute(&context)
        .unwrap();

        let state = context.load_state().unwrap();
        assert_eq!(state.directory(), repo.canonicalize().unwrap());
    }

    #[test]
    fn test_use_default_resets() {
        let temp = TempDir::new().unwrap();
        let context = RuntimeContext::new(PathConfig::under(temp.path()));
        let mut state = context.load_state().unwrap();
        state.set_directory(temp.path()).unwrap();
        context.store.save(&state).unwrap();

        UseCommand {
            directory: None,
            default: true,
        }
        .execute(&context)
        .unwrap();

        let state = context.load_state().unwrap();
        assert_eq!(state.directory(), context.paths.default_repository());
    }
}
