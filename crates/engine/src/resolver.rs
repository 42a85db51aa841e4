//! Variant/common directory precedence
//!
//! Templates, variables and configs are each split into overlay directories:
//! `<root>/<category>/<variant>` and `<root>/<category>/common`. The variant
//! overlay is searched first.

use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the shared overlay
pub const COMMON: &str = "common";

/// Kind of data kept in overlay directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// `templates/`
    Templates,
    /// `variables/`
    Variables,
    /// `configs/`
    Configs,
}

impl Category {
    /// Directory name of the category
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Templates => "templates",
            Category::Variables => "variables",
            Category::Configs => "configs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One existing overlay directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    /// Overlay tag: the variant name or [`COMMON`]
    pub overlay: String,
    /// Absolute overlay directory
    pub dir: PathBuf,
}

/// Ordered, existing overlay directories for `category`
///
/// Yields `[root/category/variant, root/category/common]` when `variant` is
/// non-empty and `[root/category/common]` otherwise, dropping directories
/// that do not exist. An empty result is not an error.
pub fn resolve(root: &Path, category: Category, variant: &str) -> Vec<SearchPath> {
    let base = root.join(category.as_str());

    let mut overlays = Vec::with_capacity(2);
    if !variant.is_empty() && variant != COMMON {
        overlays.push(variant);
    }
    overlays.push(COMMON);

    overlays
        .into_iter()
        .map(|overlay| SearchPath {
            overlay: overlay.to_string(),
            dir: base.join(overlay),
        })
        .filter(|candidate| candidate.dir.is_dir())
        .collect()
}

/// Just the directories of [`resolve`]
pub fn resolve_dirs(root: &Path, category: Category, variant: &str) -> Vec<PathBuf> {
    resolve(root, category, variant)
        .into_iter()
        .map(|search| search.dir)
        .collect()
}
