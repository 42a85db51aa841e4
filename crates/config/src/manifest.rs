//! Manifest schema
//!
//! The manifest is the top-level document of a data repository. Its `files`
//! list declares every managed output.

use crate::data::DataMap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_condition() -> String {
    "True".to_string()
}

/// One declared output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Logical name of the template providing the content
    pub template: String,

    /// Other templates whose changes also make this output stale
    #[serde(default)]
    pub extra_templates: BTreeSet<String>,

    /// Output directory; may use `~` and environment variables, and is
    /// relative to the data repository unless absolute
    pub directory: String,

    /// Output file name (defaults to the template name)
    #[serde(default)]
    pub name: Option<String>,

    /// Symlink the output instead of copying it
    pub link: bool,

    /// Set the executable bits on the output
    #[serde(default)]
    pub executable: bool,

    /// Expression that must hold for the file to be managed at all
    #[serde(default = "default_condition")]
    pub condition: String,

    /// Platforms this file applies to (empty means all)
    #[serde(default)]
    pub platforms: BTreeSet<String>,
}

impl FileSpec {
    /// Output file name
    pub fn output_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.template)
    }

    /// The primary template followed by every extra template
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.template.as_str()).chain(self.extra_templates.iter().map(String::as_str))
    }
}

/// The decoded manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Managed files, in declaration order
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

impl Manifest {
    /// Interpret a decoded document as a manifest
    pub fn from_data(data: &DataMap) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(data.clone()))
            .map_err(|e| Error::Config(format!("invalid manifest: {e}")))
    }

    /// Every template name referenced by any managed file
    pub fn templates(&self) -> BTreeSet<&str> {
        self.files.iter().flat_map(FileSpec::templates).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    fn data(value: serde_json::Value) -> DataMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let manifest = Manifest::from_data(&data(json!({
            "files": [{"template": "vimrc", "directory": "~", "link": true}]
        })))
        .unwrap();

        let file = &manifest.files[0];
        assert_eq!(file.output_name(), "vimrc");
        assert!(file.extra_templates.is_empty());
        assert!(!file.executable);
        assert_eq!(file.condition, "True");
        assert!(file.platforms.is_empty());
    }

    #[test]
    fn test_link_is_required() {
        let result = Manifest::from_data(&data(json!({
            "files": [{"template": "a", "directory": "out"}]
        })));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_referenced_templates() {
        let manifest = Manifest::from_data(&data(json!({
            "files": [
                {"template": "a", "directory": "o", "link": false, "extra_templates": ["b", "c"]},
                {"template": "b", "directory": "o", "link": false, "name": "renamed"}
            ]
        })))
        .unwrap();

        assert_eq!(
            manifest.templates().into_iter().collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
        assert_eq!(manifest.files[1].output_name(), "renamed");
    }

    #[test]
    fn test_missing_files_key_is_empty() {
        let manifest = Manifest::from_data(&DataMap::new()).unwrap();
        assert!(manifest.files.is_empty());
    }
}
