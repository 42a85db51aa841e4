//! Core types and utilities for rcm
//!
//! This is the foundation crate (Layer 0) that all other rcm crates depend on.
//! It provides:
//! - The absolute path type used for every managed output
//! - Base error types
//! - Platform detection
//! - The template rendering trait consumed by the engine
//!
//! This crate has no dependencies on other rcm crates.

pub mod error;
pub mod path;
pub mod platform;
pub mod traits;

pub use error::{Error, Result};
pub use traits::TemplateRenderer;
