//! Variable and config loading
//!
//! Both stores decode every document under their overlay directories and
//! merge them common first, then variant, so the variant wins at every leaf.
//! Config documents are additionally rendered with the merged variables
//! before they are decoded.

use crate::error::Result;
use crate::resolver::SearchPath;
use rcm_config::data::{self, DataMap};
use rcm_core::TemplateRenderer;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Merge the variable documents under `search_paths`
pub fn load_variables(search_paths: &[SearchPath]) -> Result<DataMap> {
    let mut merged = DataMap::new();
    for search in search_paths.iter().rev() {
        debug!("Loading variables from '{}'", search.dir.display());
        data::merge(&mut merged, data::decode_directory(&search.dir)?);
    }
    Ok(merged)
}

/// Merge the config documents under `search_paths`, rendering each one
/// with `variables` as context first
pub fn load_configs<R>(
    search_paths: &[SearchPath],
    variables: &DataMap,
    renderer: &R,
) -> Result<DataMap>
where
    R: TemplateRenderer + ?Sized,
{
    let context = JsonValue::Object(variables.clone());
    let mut preprocess = |path: &std::path::Path, text: &str| {
        renderer
            .render_named_str(&path.display().to_string(), text, &context)
            .map_err(|e| rcm_core::Error::decode(path, e))
    };

    let mut merged = DataMap::new();
    for search in search_paths.iter().rev() {
        debug!("Loading configs from '{}'", search.dir.display());
        data::merge(
            &mut merged,
            data::decode_directory_with(&search.dir, &mut preprocess)?,
        );
    }
    Ok(merged)
}
