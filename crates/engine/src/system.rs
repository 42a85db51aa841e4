//! System abstraction for filesystem operations
//!
//! Materialisation goes through [`System`] so a dry run can record what
//! would happen instead of doing it:
//! - `RealSystem`: Actual filesystem operations
//! - `DryRunSystem`: Records mutating operations without executing them

use crate::error::{Error, Result};
use rcm_core::path::AbsPath;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem operations materialisation needs
pub trait System {
    /// Check if a path exists (following symlinks)
    fn exists(&self, path: &AbsPath) -> bool;

    /// Remove a file or symlink; an already-absent path is not an error
    fn remove_file(&self, path: &AbsPath) -> Result<()>;

    /// Create a directory and all of its parents
    fn create_dir_all(&self, path: &AbsPath) -> Result<()>;

    /// Write a file's contents, creating parent directories
    fn write_file(&self, path: &AbsPath, content: &[u8]) -> Result<()>;

    /// Copy `from` to `to`
    fn copy_file(&self, from: &AbsPath, to: &AbsPath) -> Result<()>;

    /// Create a symbolic link at `link` pointing to `target`
    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()>;

    /// Add an execute bit wherever a read bit is set
    fn set_executable(&self, path: &AbsPath) -> Result<()>;
}

/// Execute bits derived from the read bits of `mode`
pub const fn executable_mode(mode: u32) -> u32 {
    mode | ((mode & 0o444) >> 2)
}

/// Real filesystem implementation
pub struct RealSystem;

impl System for RealSystem {
    fn exists(&self, path: &AbsPath) -> bool {
        path.as_path().exists()
    }

    fn remove_file(&self, path: &AbsPath) -> Result<()> {
        match fs::remove_file(path.as_path()) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Error::Remove {
                path: path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }

    fn create_dir_all(&self, path: &AbsPath) -> Result<()> {
        fs::create_dir_all(path.as_path()).map_err(|e| Error::DirectoryCreate {
            path: path.clone(),
            source: e,
        })
    }

    fn write_file(&self, path: &AbsPath, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(&parent)?;
        }

        fs::write(path.as_path(), content).map_err(|e| Error::FileWrite {
            path: path.clone(),
            source: e,
        })
    }

    fn copy_file(&self, from: &AbsPath, to: &AbsPath) -> Result<()> {
        fs::copy(from.as_path(), to.as_path())
            .map(|_| ())
            .map_err(|e| Error::FileWrite {
                path: to.clone(),
                source: e,
            })
    }

    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()> {
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(target, link.as_path());

        #[cfg(windows)]
        let result = if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link.as_path())
        } else {
            std::os::windows::fs::symlink_file(target, link.as_path())
        };

        result.map_err(|e| Error::FileWrite {
            path: link.clone(),
            source: e,
        })
    }

    fn set_executable(&self, path: &AbsPath) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let to_error = |e: std::io::Error| Error::FileWrite {
                path: path.clone(),
                source: e,
            };
            let mode = fs::metadata(path.as_path()).map_err(to_error)?.permissions().mode();
            fs::set_permissions(path.as_path(), fs::Permissions::from_mode(executable_mode(mode)))
                .map_err(to_error)?;
        }

        #[cfg(not(unix))]
        let _ = path;

        Ok(())
    }
}

/// Dry-run system that records operations without executing them
#[derive(Debug, Default)]
pub struct DryRunSystem {
    operations: RefCell<Vec<Operation>>,
}

/// An operation that would be performed on the filesystem
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Remove a file or symlink
    Remove {
        /// Target
        path: AbsPath,
    },
    /// Create a directory and its parents
    CreateDir {
        /// Target
        path: AbsPath,
    },
    /// Write a file
    WriteFile {
        /// Target
        path: AbsPath,
        /// Bytes written
        size: usize,
    },
    /// Copy a file
    Copy {
        /// Source
        from: AbsPath,
        /// Destination
        to: AbsPath,
    },
    /// Create a symlink
    Symlink {
        /// Link path
        link: AbsPath,
        /// What the link points at
        target: PathBuf,
    },
    /// Set the executable bits
    SetExecutable {
        /// Target
        path: AbsPath,
    },
}

impl DryRunSystem {
    /// Create a new dry-run system
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the list of operations that would be performed
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.borrow().clone()
    }

    fn record(&self, op: Operation) {
        tracing::debug!("[dry-run] {:?}", op);
        self.operations.borrow_mut().push(op);
    }
}

impl System for DryRunSystem {
    // Staleness checks read the real filesystem
    fn exists(&self, path: &AbsPath) -> bool {
        path.as_path().exists()
    }

    fn remove_file(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::Remove { path: path.clone() });
        Ok(())
    }

    fn create_dir_all(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::CreateDir { path: path.clone() });
        Ok(())
    }

    fn write_file(&self, path: &AbsPath, content: &[u8]) -> Result<()> {
        self.record(Operation::WriteFile {
            path: path.clone(),
            size: content.len(),
        });
        Ok(())
    }

    fn copy_file(&self, from: &AbsPath, to: &AbsPath) -> Result<()> {
        self.record(Operation::Copy {
            from: from.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()> {
        self.record(Operation::Symlink {
            link: link.clone(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn set_executable(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::SetExecutable { path: path.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    fn abs(path: &Path) -> AbsPath {
        AbsPath::from_path(path).unwrap()
    }

    #[test]
    fn test_executable_mode_follows_read_bits() {
        assert_eq!(executable_mode(0o644), 0o755);
        assert_eq!(executable_mode(0o600), 0o700);
        assert_eq!(executable_mode(0o640), 0o750);
        assert_eq!(executable_mode(0o755), 0o755);
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let temp = TempDir::new().unwrap();
        RealSystem
            .remove_file(&abs(&temp.path().join("missing")))
            .unwrap();
    }

    #[test]
    fn test_write_copy_and_link() {
        let temp = TempDir::new().unwrap();
        let source = abs(&temp.path().join("nested/source"));
        let copy = abs(&temp.path().join("copy"));
        let link = abs(&temp.path().join("link"));

        RealSystem.write_file(&source, b"data").unwrap();
        RealSystem.copy_file(&source, &copy).unwrap();
        RealSystem.symlink(source.as_path(), &link).unwrap();

        assert_eq!(fs::read(copy.as_path()).unwrap(), b"data");
        assert_eq!(fs::read_link(link.as_path()).unwrap(), source.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_set_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = abs(&temp.path().join("script"));
        RealSystem.write_file(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(path.as_path(), fs::Permissions::from_mode(0o640)).unwrap();

        RealSystem.set_executable(&path).unwrap();
        let mode = fs::metadata(path.as_path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn test_dry_run_records_without_touching() {
        let temp = TempDir::new().unwrap();
        let target = abs(&temp.path().join("out/file"));
        let system = DryRunSystem::new();

        system.write_file(&target, b"abc").unwrap();
        system.set_executable(&target).unwrap();

        assert!(!temp.path().join("out").exists());
        assert_eq!(
            system.operations(),
            [
                Operation::WriteFile {
                    path: target.clone(),
                    size: 3
                },
                Operation::SetExecutable { path: target },
            ]
        );
    }
}
