//! Cross-invocation state
//!
//! [`State`] records which data repository and variant are active, plus a
//! snapshot of the last merged variables, configs and manifest. Comparing
//! the current merge against that snapshot is how the engine knows the data
//! itself changed. [`StateStore`] loads and atomically saves the document.

use crate::error::{Error, Result};
use rcm_config::{DataMap, PathConfig};
use rcm_core::path::AbsPath;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Snapshot of the data in effect at the last successful save
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Previous {
    /// Variant of the last save
    #[serde(default)]
    pub variant: String,
    /// Merged variables of the last save
    #[serde(default)]
    pub variables: DataMap,
    /// Decoded configs of the last save
    #[serde(default)]
    pub configs: DataMap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ChangeFlags {
    variables: bool,
    configs: bool,
    manifest: bool,
}

/// The persisted cross-invocation record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    directory: PathBuf,
    variant: String,
    previous: Previous,
    manifest: DataMap,
    #[serde(skip)]
    flags: ChangeFlags,
}

#[derive(Deserialize)]
struct StateDocument {
    directory: Option<PathBuf>,
    #[serde(default)]
    variant: String,
    #[serde(default)]
    previous: Previous,
    #[serde(default)]
    manifest: DataMap,
}

impl State {
    /// Fresh state pointing at `directory` with no variant selected
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            variant: String::new(),
            previous: Previous::default(),
            manifest: DataMap::new(),
            flags: ChangeFlags::default(),
        }
    }

    /// Selected data repository
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The data repository root as an absolute path
    pub fn root(&self) -> Result<AbsPath> {
        Ok(AbsPath::from_path(&self.directory)?)
    }

    /// Selected variant; empty for none
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Snapshot of the last save
    pub fn previous(&self) -> &Previous {
        &self.previous
    }

    /// Manifest data as last loaded
    pub fn manifest(&self) -> &DataMap {
        &self.manifest
    }

    /// Select a new data repository
    ///
    /// Returns `false` (and changes nothing) when `path` resolves to the
    /// current directory.
    pub fn set_directory(&mut self, path: &Path) -> Result<bool> {
        let resolved = AbsPath::current_dir_join(path)?.into_path_buf();

        if resolved == self.directory {
            info!("New directory '{}' same as current.", resolved.display());
            return Ok(false);
        }

        info!("Set directory to '{}'.", resolved.display());
        self.directory = resolved;
        Ok(true)
    }

    /// Select a new variant
    ///
    /// `None` or an empty name only reports the current variant. A different
    /// name records the old one in `previous.variant`, which is what makes
    /// [`State::is_new`] see the switch exactly once.
    pub fn set_variant(&mut self, name: Option<&str>) -> bool {
        match name {
            None | Some("") => {
                info!("Current variant: '{}'.", self.variant);
                false
            }
            Some(name) if name == self.variant => false,
            Some(name) => {
                self.previous.variant = std::mem::replace(&mut self.variant, name.to_string());
                info!("Updating variant to '{}'.", name);
                true
            }
        }
    }

    /// Record freshly merged variables; returns whether they changed
    pub fn update_variables(&mut self, variables: DataMap) -> bool {
        self.flags.variables = self.previous.variables != variables;
        self.previous.variables = variables;
        if self.flags.variables {
            info!("Variable data is updated.");
        }
        self.flags.variables
    }

    /// Record freshly merged configs; returns whether they changed
    pub fn update_configs(&mut self, configs: DataMap) -> bool {
        self.flags.configs = self.previous.configs != configs;
        self.previous.configs = configs;
        if self.flags.configs {
            info!("Configuration data is updated.");
        }
        self.flags.configs
    }

    /// Record the freshly decoded manifest; returns whether it changed
    pub fn update_manifest(&mut self, manifest: DataMap) -> bool {
        self.flags.manifest = self.manifest != manifest;
        self.manifest = manifest;
        self.flags.manifest
    }

    /// Whether the variant differs from the last save
    pub fn variant_changed(&self) -> bool {
        self.variant != self.previous.variant
    }

    /// Whether anything global changed since the last save
    pub fn is_new(&self) -> bool {
        self.variant_changed()
            || self.flags.variables
            || self.flags.configs
            || self.flags.manifest
    }

    /// Make the current variant the previous one, ahead of saving
    pub fn mark_applied(&mut self) {
        self.previous.variant.clone_from(&self.variant);
    }
}

/// Loads and saves [`State`] at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    default_directory: PathBuf,
}

impl StateStore {
    /// Store at `path`; fresh states point at `default_directory`
    pub fn new(path: impl Into<PathBuf>, default_directory: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_directory: default_directory.into(),
        }
    }

    /// The store described by `paths`
    pub fn from_paths(paths: &PathConfig) -> Self {
        Self::new(paths.state_file(), paths.default_repository())
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository used when none was selected
    pub fn default_directory(&self) -> &Path {
        &self.default_directory
    }

    /// Load the state document, or a default one when none exists yet
    pub fn load(&self) -> Result<State> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(State::new(&self.default_directory));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let doc: StateDocument = serde_json::from_str(&text).map_err(|e| {
            Error::State(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        let state = State {
            directory: doc
                .directory
                .unwrap_or_else(|| self.default_directory.clone()),
            variant: doc.variant,
            previous: doc.previous,
            manifest: doc.manifest,
            flags: ChangeFlags::default(),
        };

        info!("Using directory '{}'.", state.directory.display());
        if !state.variant.is_empty() {
            info!("Using variant '{}'.", state.variant);
        }
        Ok(state)
    }

    /// Atomically write `state` back
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so an interrupted save leaves the old contents.
    pub fn save(&self, state: &State) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::State(format!("invalid state path {}", self.path.display())))?;
        fs::create_dir_all(parent)?;

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut file, state)
            .map_err(|e| Error::State(format!("failed to encode state: {e}")))?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved state to '{}'", self.path.display());
        Ok(())
    }
}
