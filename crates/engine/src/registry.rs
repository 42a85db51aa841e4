//! Template discovery
//!
//! Every file below the resolved template directories is a template. Files
//! ending in [`TEMPLATE_SUFFIX`] are rendered before use, everything else is
//! copied or linked verbatim. The logical name is the path relative to its
//! overlay directory, `/`-separated, without the suffix.

use crate::error::{Error, Result};
use crate::resolver::SearchPath;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub use rcm_template::engine::TEMPLATE_SUFFIX;

/// How a template's source is turned into output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Used verbatim
    Literal,
    /// Rendered through the template engine first
    Renderable,
}

/// One discovered template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Logical name, without the `.j2` suffix
    pub name: String,
    /// Absolute source path
    pub path: PathBuf,
    /// Overlay the template was found in
    pub overlay: String,
    /// Literal or renderable
    pub kind: TemplateKind,
}

impl Template {
    /// Whether the source goes through the renderer
    pub fn is_renderable(&self) -> bool {
        self.kind == TemplateKind::Renderable
    }
}

/// Templates indexed by logical name and by source path
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    search_paths: Vec<SearchPath>,
    by_name: BTreeMap<String, Template>,
    by_path: HashMap<PathBuf, String>,
}

/// Split a path below an overlay directory into its logical name and kind
pub fn logical_name(relative: &Path) -> Option<(String, TemplateKind)> {
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let joined = parts.join("/");

    match joined.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => {
            Some((stripped.to_string(), TemplateKind::Renderable))
        }
        _ => Some((joined, TemplateKind::Literal)),
    }
}

impl TemplateRegistry {
    /// Index every template under `search_paths`
    ///
    /// Search paths are visited in order, so a variant overlay listed first
    /// shadows common templates of the same name. Later duplicates are
    /// logged and ignored.
    pub fn load(search_paths: &[SearchPath]) -> Result<Self> {
        let mut registry = Self {
            search_paths: search_paths.to_vec(),
            ..Self::default()
        };

        for search in search_paths {
            for entry in WalkDir::new(&search.dir)
                .follow_links(true)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.into_path();
                let Some((name, kind)) = path
                    .strip_prefix(&search.dir)
                    .ok()
                    .and_then(logical_name)
                else {
                    warn!("Skipping template with non-UTF-8 path '{}'", path.display());
                    continue;
                };

                if let Some(existing) = registry.by_name.get(&name) {
                    debug!(
                        "Template '{}' at '{}' shadowed by '{}'",
                        name,
                        path.display(),
                        existing.path.display()
                    );
                    continue;
                }

                registry.by_path.insert(path.clone(), name.clone());
                registry.by_name.insert(
                    name.clone(),
                    Template {
                        name,
                        path,
                        overlay: search.overlay.clone(),
                        kind,
                    },
                );
            }
        }

        debug!("Loaded {} templates", registry.by_name.len());
        Ok(registry)
    }

    /// The selected template for a logical name
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.by_name.get(name)
    }

    /// The template whose selected source is exactly `path`
    pub fn by_path(&self, path: &Path) -> Option<&Template> {
        self.by_path.get(path).and_then(|name| self.by_name.get(name))
    }

    /// Logical name of any path below one of the search directories,
    /// whether or not it still exists or is the selected source
    pub fn name_for(&self, path: &Path) -> Option<String> {
        self.locate(path).map(|(name, _)| name)
    }

    /// Logical name of `path` together with the rank of its search path
    /// (0 is the highest-priority overlay)
    pub fn locate(&self, path: &Path) -> Option<(String, usize)> {
        self.search_paths
            .iter()
            .enumerate()
            .find_map(|(rank, search)| {
                path.strip_prefix(&search.dir)
                    .ok()
                    .and_then(logical_name)
                    .map(|(name, _)| (name, rank))
            })
    }

    /// Rank of the search path containing `path`
    pub fn rank(&self, path: &Path) -> Option<usize> {
        self.locate(path).map(|(_, rank)| rank)
    }

    /// Paths a template called `name` could have been loaded from
    pub fn candidate_paths(&self, name: &str) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .flat_map(|search| {
                [
                    search.dir.join(format!("{name}{TEMPLATE_SUFFIX}")),
                    search.dir.join(name),
                ]
            })
            .collect()
    }

    /// Overlays searched, highest precedence first
    pub fn search_paths(&self) -> &[SearchPath] {
        &self.search_paths
    }

    /// Every logical name, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Number of logical names
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no template was found
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
