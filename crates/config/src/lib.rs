//! Configuration management for rcm
//!
//! This crate handles:
//! - XDG directory management ([`PathConfig`])
//! - Data document decoding (JSON, YAML, TOML) with `includes`
//! - Deep merging of layered data
//! - The manifest (`files`) schema
//! - Logging initialization

pub mod data;
pub mod dirs;
pub mod logging;
pub mod manifest;

// Re-export error types from core
pub use rcm_core::{Error, Result};

pub use data::{DataMap, decode_directory, decode_file, merge};
pub use dirs::PathConfig;
pub use manifest::{FileSpec, Manifest};
