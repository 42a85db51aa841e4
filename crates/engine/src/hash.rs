//! Content hashing using blake3
//!
//! Fingerprints and build-output comparisons both use blake3.

use std::fs::File;
use std::io::{BufReader, Result as IoResult};
use std::path::Path;

/// Hash content using blake3
///
/// # Examples
///
/// ```
/// use rcm_engine::hash::hash_content;
///
/// let hash = hash_content(b"Hello, world!");
/// assert_eq!(hash.len(), 32);
/// ```
#[must_use]
pub fn hash_content(content: &[u8]) -> [u8; 32] {
    *blake3::hash(content).as_bytes()
}

/// Hash a file with buffered reading, returning the hex digest
pub fn hash_file_hex(path: &Path) -> IoResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
