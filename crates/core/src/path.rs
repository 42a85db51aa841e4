//! Type-safe absolute paths
//!
//! [`AbsPath`] guarantees at construction time that a path is absolute.
//! Managed outputs, the data repository root and template sources are all
//! carried as `AbsPath` so relative paths can never leak into filesystem
//! operations.
//!
//! # Examples
//!
//! ```
//! use rcm_core::path::AbsPath;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = AbsPath::new("/home/user/dotfiles".into())?;
//!
//! // Relative output directories are resolved against the repository root
//! let out = root.resolve(Path::new("out"));
//! assert_eq!(out.as_path(), Path::new("/home/user/dotfiles/out"));
//!
//! // Absolute ones are kept as they are
//! let abs = root.resolve(Path::new("/etc/xdg"));
//! assert_eq!(abs.as_path(), Path::new("/etc/xdg"));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An absolute path on the filesystem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Create a new `AbsPath` from a `PathBuf`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcm_core::path::AbsPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let abs = AbsPath::new("/home/user".into())?;
    /// assert!(abs.as_path().is_absolute());
    ///
    /// let err = AbsPath::new("relative/path".into());
    /// assert!(err.is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_absolute() {
            Ok(AbsPath(path))
        } else {
            Err(Error::PathNotAbsolute { path })
        }
    }

    /// Create a new `AbsPath` from a reference to a `Path`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(path.to_path_buf())
    }

    /// Make `path` absolute against the current working directory
    ///
    /// Symlinks are resolved when the path exists; otherwise the lexical
    /// absolute form is used.
    pub fn current_dir_join(path: &Path) -> Result<Self> {
        if let Ok(canonical) = std::fs::canonicalize(path) {
            return Self::new(canonical);
        }
        Self::new(std::path::absolute(path)?)
    }

    /// Resolve `path` against this directory
    ///
    /// Absolute inputs are returned unchanged.
    pub fn resolve(&self, path: &Path) -> Self {
        if path.is_absolute() {
            AbsPath(path.to_path_buf())
        } else {
            AbsPath(self.0.join(path))
        }
    }

    /// Join a path component (or relative path)
    pub fn join(&self, component: impl AsRef<Path>) -> Self {
        self.resolve(component.as_ref())
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is the root directory.
    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    /// Get the file name
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

impl AsRef<Path> for AbsPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for AbsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
