//! Core behavioral traits for rcm components
//!
//! The engine renders templates and configuration fragments through this
//! trait so it never depends on a concrete template engine.

use crate::Result;

/// Template renderer interface
///
/// Uses `serde_json::Value` for context to ensure trait object safety.
/// Any struct implementing `serde::Serialize` can be converted to `Value` with `serde_json::to_value()`.
///
/// # Examples
///
/// ```ignore
/// fn render_greeting(renderer: &dyn TemplateRenderer) -> Result<String> {
///     let context = serde_json::json!({"name": "Alice"});
///     renderer.render_named_str("greeting", "Hello {{ name }}!", &context)
/// }
/// ```
pub trait TemplateRenderer {
    /// Render a template source with a name used in error messages
    ///
    /// # Arguments
    ///
    /// * `name` - Template name to use in error messages (e.g., logical name or file path)
    /// * `template` - The template source code
    /// * `context` - Context data as a JSON value
    fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String>;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
    fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String> {
        (**self).render_named_str(name, template, context)
    }
}
