//! XDG directory configuration
//!
//! [`PathConfig`] is the single place process-wide locations are decided.
//! It is constructed once (normally from the XDG environment) and passed
//! explicitly to every component that needs to touch the filesystem outside
//! of the data repository:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_STATE_HOME` defaults to ~/.local/state
//! - `XDG_CACHE_HOME` defaults to ~/.cache
//! - `XDG_DATA_HOME` defaults to ~/.local/share

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

const PREFIX: &str = "rcm";

/// Resolved per-user directories for rcm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    config_home: PathBuf,
    state_home: PathBuf,
    cache_home: PathBuf,
    data_home: PathBuf,
}

impl PathConfig {
    /// Build from explicit, already-prefixed directories
    pub fn new(
        config_home: impl Into<PathBuf>,
        state_home: impl Into<PathBuf>,
        cache_home: impl Into<PathBuf>,
        data_home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_home: config_home.into(),
            state_home: state_home.into(),
            cache_home: cache_home.into(),
            data_home: data_home.into(),
        }
    }

    /// Lay every directory out below a single root (`<root>/{config,state,cache,data}/rcm`)
    pub fn under(root: &Path) -> Self {
        Self::new(
            root.join("config").join(PREFIX),
            root.join("state").join(PREFIX),
            root.join("cache").join(PREFIX),
            root.join("data").join(PREFIX),
        )
    }

    /// Resolve directories from the XDG environment
    pub fn from_env() -> Result<Self> {
        // xdg 3.0: with_prefix returns BaseDirectories, get_*_home returns Option<PathBuf>
        let base = BaseDirectories::with_prefix(PREFIX);
        let missing = |what: &str| Error::Config(format!("cannot determine XDG {what} directory"));

        Ok(Self {
            config_home: base.get_config_home().ok_or_else(|| missing("config"))?,
            state_home: base.get_state_home().ok_or_else(|| missing("state"))?,
            cache_home: base.get_cache_home().ok_or_else(|| missing("cache"))?,
            data_home: base.get_data_home().ok_or_else(|| missing("data"))?,
        })
    }

    /// `$XDG_CONFIG_HOME/rcm`
    pub fn config_home(&self) -> &Path {
        &self.config_home
    }

    /// `$XDG_STATE_HOME/rcm`
    pub fn state_home(&self) -> &Path {
        &self.state_home
    }

    /// `$XDG_CACHE_HOME/rcm`
    pub fn cache_home(&self) -> &Path {
        &self.cache_home
    }

    /// `$XDG_DATA_HOME/rcm`
    pub fn data_home(&self) -> &Path {
        &self.data_home
    }

    /// Location of the persisted state document
    pub fn state_file(&self) -> PathBuf {
        self.state_home.join("state.json")
    }

    /// Data repository used when none has been selected
    pub fn default_repository(&self) -> PathBuf {
        self.config_home.join("default")
    }

    /// Fingerprint cache for template directories
    pub fn template_cache(&self) -> PathBuf {
        self.cache_home.join("templates.json")
    }

    /// Per-process fingerprint cache for `watch`
    pub fn watch_cache(&self, pid: u32) -> PathBuf {
        self.cache_home.join(format!("watch_cache-{pid}.json"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_from_env_honours_xdg_overrides() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        let paths = temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some(root.join("c"))),
                ("XDG_STATE_HOME", Some(root.join("s"))),
                ("XDG_CACHE_HOME", Some(root.join("k"))),
                ("XDG_DATA_HOME", Some(root.join("d"))),
            ],
            PathConfig::from_env,
        )
        .unwrap();

        assert_eq!(paths.config_home(), root.join("c/rcm"));
        assert_eq!(paths.state_home(), root.join("s/rcm"));
        assert_eq!(paths.cache_home(), root.join("k/rcm"));
        assert_eq!(paths.data_home(), root.join("d/rcm"));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_are_absolute() {
        let paths = temp_env::with_vars_unset(
            [
                "XDG_CONFIG_HOME",
                "XDG_STATE_HOME",
                "XDG_CACHE_HOME",
                "XDG_DATA_HOME",
            ],
            PathConfig::from_env,
        );

        if let Ok(paths) = paths {
            assert!(paths.config_home().is_absolute());
            assert!(paths.state_home().ends_with("rcm"));
        }
    }

    #[test]
    fn test_derived_locations() {
        let paths = PathConfig::under(Path::new("/tmp/x"));

        assert_eq!(paths.state_file(), Path::new("/tmp/x/state/rcm/state.json"));
        assert_eq!(
            paths.default_repository(),
            Path::new("/tmp/x/config/rcm/default")
        );
        assert_eq!(
            paths.template_cache(),
            Path::new("/tmp/x/cache/rcm/templates.json")
        );
        assert_eq!(
            paths.watch_cache(42),
            Path::new("/tmp/x/cache/rcm/watch_cache-42.json")
        );
    }
}
