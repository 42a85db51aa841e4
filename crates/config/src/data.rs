//! Data document decoding and layered merging
//!
//! Manifests, variables and configs are all plain data documents in one of
//! the supported formats. Every document decodes to a JSON object so the
//! rest of the system only ever deals with [`serde_json::Value`].

use crate::{Error, Result};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A decoded data document
pub type DataMap = serde_json::Map<String, JsonValue>;

/// Key naming other documents to merge in before the including document
pub const INCLUDES_KEY: &str = "includes";

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl Format {
    /// Extensions tried, in order, when looking for a document by base name
    pub const EXTENSIONS: &'static [&'static str] = &["json", "yaml", "yml", "toml"];

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Parse `text` into a JSON value
    pub fn parse(self, text: &str, path: &Path) -> Result<JsonValue> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| Error::decode(path, e)),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| Error::decode(path, e)),
            Self::Toml => {
                let value: toml::Value = toml::from_str(text).map_err(|e| Error::decode(path, e))?;
                serde_json::to_value(value).map_err(|e| Error::decode(path, e))
            }
        }
    }
}

/// Every candidate path for a document with base name `base` (`base.json`, `base.yaml`, ...)
pub fn data_candidates(base: &Path) -> Vec<PathBuf> {
    Format::EXTENSIONS
        .iter()
        .map(|ext| {
            let mut name = base.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        })
        .collect()
}

/// The subset of [`data_candidates`] that exist as files
pub fn existing_candidates(base: &Path) -> Vec<PathBuf> {
    data_candidates(base)
        .into_iter()
        .filter(|p| p.is_file())
        .collect()
}

/// Decode a single document, resolving its `includes`
pub fn decode_file(path: &Path) -> Result<DataMap> {
    decode_file_with(path, &mut |_, text| Ok(text.to_string()))
}

/// Decode a single document, passing its raw text (and that of every
/// included document) through `preprocess` first
pub fn decode_file_with<F>(path: &Path, preprocess: &mut F) -> Result<DataMap>
where
    F: FnMut(&Path, &str) -> Result<String>,
{
    let mut visiting = HashSet::new();
    decode_recursive(path, preprocess, &mut visiting)
}

fn decode_recursive<F>(
    path: &Path,
    preprocess: &mut F,
    visiting: &mut HashSet<PathBuf>,
) -> Result<DataMap>
where
    F: FnMut(&Path, &str) -> Result<String>,
{
    let format = Format::from_path(path)
        .ok_or_else(|| Error::decode(path, "unsupported document extension"))?;

    let key = fs::canonicalize(path)?;
    if !visiting.insert(key.clone()) {
        tracing::warn!("Include cycle through '{}', skipping", path.display());
        return Ok(DataMap::new());
    }

    let raw = fs::read_to_string(path)?;
    let text = preprocess(path, &raw)?;

    let mut own = match format.parse(&text, path)? {
        JsonValue::Object(map) => map,
        JsonValue::Null => DataMap::new(),
        other => {
            return Err(Error::decode(
                path,
                format!("expected a mapping at the top level, found {other}"),
            ));
        }
    };

    let mut result = DataMap::new();
    if let Some(includes) = own.remove(INCLUDES_KEY) {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        for include in include_list(&includes, path)? {
            let included = decode_recursive(&parent.join(include), preprocess, visiting)?;
            merge(&mut result, included);
        }
    }
    merge(&mut result, own);

    visiting.remove(&key);
    tracing::debug!("Decoded '{}'", path.display());
    Ok(result)
}

fn include_list<'a>(value: &'a JsonValue, path: &Path) -> Result<Vec<&'a str>> {
    match value {
        JsonValue::String(s) => Ok(vec![s.as_str()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::decode(path, "'includes' entries must be strings"))
            })
            .collect(),
        _ => Err(Error::decode(
            path,
            "'includes' must be a string or a list of strings",
        )),
    }
}

/// Decode every document below `dir`
///
/// Each file contributes under the nested keys formed by its relative
/// directory components and its file stem, so `git/user.toml` lands at
/// `{"git": {"user": {...}}}`. Files are visited in path order and merged
/// one by one.
pub fn decode_directory(dir: &Path) -> Result<DataMap> {
    decode_directory_with(dir, &mut |_, text| Ok(text.to_string()))
}

/// [`decode_directory`] with a text preprocessor applied to every document
pub fn decode_directory_with<F>(dir: &Path, preprocess: &mut F) -> Result<DataMap>
where
    F: FnMut(&Path, &str) -> Result<String>,
{
    let mut result = DataMap::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::decode(dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if Format::from_path(path).is_none() {
            tracing::debug!("Ignoring '{}' (not a data document)", path.display());
            continue;
        }

        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let mut keys: Vec<String> = relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let Some(stem) = path.file_stem() else {
            continue;
        };
        keys.push(stem.to_string_lossy().into_owned());

        let mut value = JsonValue::Object(decode_file_with(path, preprocess)?);
        for key in keys.into_iter().rev() {
            let mut wrapper = DataMap::new();
            wrapper.insert(key, value);
            value = JsonValue::Object(wrapper);
        }

        if let JsonValue::Object(map) = value {
            merge(&mut result, map);
        }
    }

    Ok(result)
}

/// Deep merge `overlay` into `base`
///
/// Mappings merge recursively; any other value (scalars and arrays alike)
/// is a leaf and the overlay replaces it.
pub fn merge(base: &mut DataMap, overlay: DataMap) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(JsonValue::Object(base_obj)), JsonValue::Object(overlay_obj)) => {
                merge(base_obj, overlay_obj);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
