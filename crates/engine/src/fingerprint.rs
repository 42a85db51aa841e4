//! Persisted file fingerprints
//!
//! [`FingerprintCache`] remembers what every watched file looked like the
//! last time a change to it was *accepted*. Polling compares the filesystem
//! against that record and offers each difference to a caller-supplied
//! predicate; rejected changes are left untouched so they are offered again
//! on the next poll.

use crate::error::{Error, Result};
use crate::hash::hash_file_hex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How much of a file the cache compares between polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompareMode {
    /// Only appearance and disappearance; edits are never reported
    Presence,
    /// Size and modification time
    Metadata,
    /// Size and blake3 digest
    #[default]
    Contents,
}

impl CompareMode {
    fn hashes(self) -> bool {
        self == Self::Contents
    }
}

/// What a file looked like when it was last accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Length in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: u64,
    /// blake3 hex digest, present when contents are checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Fingerprint {
    /// Fingerprint the file at `path`
    pub fn capture(path: &Path, mode: CompareMode) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));

        Ok(Self {
            size: metadata.len(),
            mtime_ns,
            hash: if mode.hashes() {
                Some(hash_file_hex(path)?)
            } else {
                None
            },
        })
    }

    /// Whether `self` and `other` describe different file contents under `mode`
    ///
    /// Presence never differs. Contents compares size and hash, falling back
    /// to mtime when either side has no hash. Metadata compares size and mtime.
    pub fn differs(&self, other: &Fingerprint, mode: CompareMode) -> bool {
        if mode == CompareMode::Presence {
            return false;
        }
        if self.size != other.size {
            return true;
        }
        match (mode, &self.hash, &other.hash) {
            (CompareMode::Contents, Some(a), Some(b)) => a != b,
            _ => self.mtime_ns != other.mtime_ns,
        }
    }
}

/// Kind of difference reported by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Present on disk, unknown to the cache
    Added,
    /// Known to the cache with a different fingerprint
    Changed,
    /// Known to the cache, gone from disk
    Removed,
}

/// One difference between the filesystem and the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// File the change concerns
    pub path: PathBuf,
    /// What happened to it
    pub kind: ChangeKind,
    /// Cached fingerprint (absent for [`ChangeKind::Added`])
    pub old: Option<Fingerprint>,
    /// Current fingerprint (absent for [`ChangeKind::Removed`])
    pub new: Option<Fingerprint>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    files: BTreeMap<PathBuf, Fingerprint>,
}

/// Path to fingerprint map backed by a JSON file
#[derive(Debug)]
pub struct FingerprintCache {
    path: PathBuf,
    entries: BTreeMap<PathBuf, Fingerprint>,
    mode: CompareMode,
    dirty: bool,
}

impl FingerprintCache {
    /// Load the cache at `path`
    ///
    /// A missing or unreadable cache file starts an empty cache.
    pub fn load(path: impl Into<PathBuf>, mode: CompareMode) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheDocument>(&text) {
                Ok(doc) => doc.files,
                Err(e) => {
                    warn!("Ignoring unreadable cache '{}': {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache at '{}', starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Failed to read cache '{}': {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries,
            mode,
            dirty: false,
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepted fingerprint of `path`
    pub fn get(&self, path: &Path) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    /// Whether `path` has an accepted fingerprint
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Compare every file below `dir` against the cache
    ///
    /// Files missing from the cache are offered as added, files whose
    /// fingerprint differs as changed, and cached entries below `dir` that no
    /// longer exist as removed. Returns how many changes were accepted.
    pub fn poll_directory<F>(&mut self, dir: &Path, mut accept: F) -> Result<usize>
    where
        F: FnMut(&FileChange) -> bool,
    {
        let mut seen = BTreeSet::new();
        let mut changes = Vec::new();

        if dir.is_dir() {
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.into_path();
                let Some(new) = self.capture(&path)? else {
                    continue;
                };
                match self.entries.get(&path) {
                    None => changes.push(FileChange {
                        path: path.clone(),
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(new),
                    }),
                    Some(old) if old.differs(&new, self.mode) => {
                        changes.push(FileChange {
                            path: path.clone(),
                            kind: ChangeKind::Changed,
                            old: Some(old.clone()),
                            new: Some(new),
                        });
                    }
                    Some(_) => {}
                }
                seen.insert(path);
            }
        }

        for (path, old) in self.entries.range(dir.to_path_buf()..) {
            if !path.starts_with(dir) {
                break;
            }
            if !seen.contains(path) {
                changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                    old: Some(old.clone()),
                    new: None,
                });
            }
        }

        Ok(self.offer(changes, &mut accept))
    }

    /// Re-check every cached entry, wherever it lives
    pub fn poll_existing<F>(&mut self, mut accept: F) -> Result<usize>
    where
        F: FnMut(&FileChange) -> bool,
    {
        let mut changes = Vec::new();

        for (path, old) in &self.entries {
            match self.capture(path)? {
                None => changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                    old: Some(old.clone()),
                    new: None,
                }),
                Some(new) if old.differs(&new, self.mode) => {
                    changes.push(FileChange {
                        path: path.clone(),
                        kind: ChangeKind::Changed,
                        old: Some(old.clone()),
                        new: Some(new),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(self.offer(changes, &mut accept))
    }

    fn capture(&self, path: &Path) -> Result<Option<Fingerprint>> {
        match Fingerprint::capture(path, self.mode) {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn offer<F>(&mut self, changes: Vec<FileChange>, accept: &mut F) -> usize
    where
        F: FnMut(&FileChange) -> bool,
    {
        let mut accepted = 0;
        for change in changes {
            if !accept(&change) {
                debug!("Change to '{}' not accepted", change.path.display());
                continue;
            }
            match change.new {
                Some(new) => {
                    self.entries.insert(change.path, new);
                }
                None => {
                    self.entries.remove(&change.path);
                }
            }
            accepted += 1;
            self.dirty = true;
        }
        accepted
    }

    /// Put `path` back to an earlier fingerprint, or forget it for `None`
    ///
    /// The change is offered again on the next poll.
    pub fn revert(&mut self, path: PathBuf, old: Option<Fingerprint>) {
        match old {
            Some(old) => {
                self.entries.insert(path, old);
            }
            None => {
                self.entries.remove(&path);
            }
        }
        self.dirty = true;
    }

    /// Write the cache back if anything was accepted since loading
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::State(format!("invalid cache path {}", self.path.display())))?;
        fs::create_dir_all(parent)?;

        let document = CacheDocument {
            files: self.entries.clone(),
        };
        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&mut file, &document)
            .map_err(|e| Error::State(format!("failed to encode cache: {e}")))?;
        file.flush()?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        self.dirty = false;
        debug!("Saved cache '{}'", self.path.display());
        Ok(())
    }

    /// Delete the backing file, if any
    pub fn discard(self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Error::Io(e)),
            _ => Ok(()),
        }
    }
}
