//! Template engine implementation
//!
//! The engine wraps minijinja and provides template rendering with custom functions.

use crate::functions;
use crate::{Error, Result};
use minijinja::Environment;
use std::path::PathBuf;

/// Suffix marking a template source as renderable
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// Template engine for rendering templates
pub struct TemplateEngine {
    /// The minijinja environment
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine without an include loader
    #[must_use]
    pub fn new() -> Self {
        Self::with_search_paths(Vec::new())
    }

    /// Create a template engine that resolves `{% include %}` and
    /// `{% import %}` against the given directories
    ///
    /// For `{% include "aliases" %}` each directory is searched, in order, for
    /// `aliases` and then `aliases.j2`. Passing the variant overlay before the
    /// common one gives includes the same precedence as managed templates.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcm_template::TemplateEngine;
    /// use std::path::PathBuf;
    ///
    /// let engine = TemplateEngine::with_search_paths(vec![
    ///     PathBuf::from("/repo/templates/laptop"),
    ///     PathBuf::from("/repo/templates/common"),
    /// ]);
    /// # let _ = engine;
    /// ```
    #[must_use]
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        let mut env = Environment::new();

        // Jinja2 standard whitespace control
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        env.add_function("env", functions::env);
        env.add_function("os", functions::os);
        env.add_function("arch", functions::arch);
        env.add_function("hostname", functions::hostname);
        env.add_function("joinPath", functions::join_path);

        env.add_filter("quote", functions::quote);
        env.add_filter("toJson", functions::to_json);
        env.add_filter("fromJson", functions::from_json);
        env.add_filter("toToml", functions::to_toml);
        env.add_filter("fromToml", functions::from_toml);
        env.add_filter("trim", functions::trim);

        if !search_paths.is_empty() {
            env.set_loader(move |name| {
                for dir in &search_paths {
                    let candidates = [
                        dir.join(name),
                        dir.join(format!("{name}{TEMPLATE_SUFFIX}")),
                    ];
                    for path in candidates {
                        if path.is_file() {
                            tracing::debug!("Including '{}' from '{}'", name, path.display());
                            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                                minijinja::Error::new(
                                    minijinja::ErrorKind::InvalidOperation,
                                    format!("Failed to read template '{name}': {e}"),
                                )
                            });
                        }
                    }
                }
                Ok(None)
            });
        }

        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// # Examples
    ///
    /// ```
    /// use rcm_template::{TemplateContext, TemplateEngine};
    ///
    /// let engine = TemplateEngine::new();
    /// let context = TemplateContext::new().with_variant("laptop");
    ///
    /// let result = engine.render_str("on {{ variant }}", &context.to_value()).unwrap();
    /// assert_eq!(result, "on laptop");
    /// ```
    pub fn render_str(&self, template: &str, context: &serde_json::Value) -> Result<String> {
        self.env.render_str(template, context).map_err(Error::from)
    }

    /// Render a template string with a specific name for better error messages
    pub fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String> {
        self.env
            .render_named_str(name, template, context)
            .map_err(Error::from)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl rcm_core::TemplateRenderer for TemplateEngine {
    fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> rcm_core::Result<String> {
        TemplateEngine::render_named_str(self, name, template, context).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use rcm_core::TemplateRenderer;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_render_variables() {
        let engine = TemplateEngine::new();
        let result = engine
            .render_str("Hello {{ name }}!", &json!({"name": "rcm"}))
            .unwrap();
        assert_eq!(result, "Hello rcm!");
    }

    #[test]
    fn test_keeps_trailing_newline_and_trims_blocks() {
        let engine = TemplateEngine::new();
        let template = "{% if on %}\nyes\n{% endif %}\n";
        let result = engine.render_str(template, &json!({"on": true})).unwrap();
        assert_eq!(result, "yes\n");
    }

    #[test]
    fn test_custom_functions_registered() {
        let engine = TemplateEngine::new();
        let result = engine
            .render_str("{{ os() }} {{ 'a b' | quote }}", &json!({}))
            .unwrap();
        assert_eq!(
            result,
            format!("{} \"a b\"", rcm_core::platform::CURRENT_PLATFORM.os)
        );
    }

    #[test]
    fn test_named_error_has_location() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_named_str("broken", "{% if %}", &json!({}))
            .unwrap_err();
        let Error::Render { location, .. } = err else {
            panic!("expected render error");
        };
        assert!(location.contains("broken"), "{location}");
    }

    #[test]
    fn test_include_prefers_earlier_search_path() {
        let variant = TempDir::new().unwrap();
        let common = TempDir::new().unwrap();
        std::fs::write(variant.path().join("part.j2"), "variant").unwrap();
        std::fs::write(common.path().join("part"), "common").unwrap();
        std::fs::write(common.path().join("only"), "only-common").unwrap();

        let engine = TemplateEngine::with_search_paths(vec![
            variant.path().to_path_buf(),
            common.path().to_path_buf(),
        ]);
        let result = engine
            .render_str(r#"{% include "part" %}/{% include "only" %}"#, &json!({}))
            .unwrap();
        assert_eq!(result, "variant/only-common");
    }

    #[test]
    fn test_renderer_trait_maps_errors() {
        let engine = TemplateEngine::new();
        let renderer: &dyn TemplateRenderer = &engine;
        let err = renderer
            .render_named_str("x", "{{ 1 + }}", &json!({}))
            .unwrap_err();
        assert!(matches!(err, rcm_core::Error::Render(_)));
    }
}
