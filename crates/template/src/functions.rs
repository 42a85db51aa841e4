//! Custom template functions
//!
//! This module provides custom functions and filters for use in templates.

use minijinja::{Error, ErrorKind, Value};
use rcm_core::platform::CURRENT_PLATFORM;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::OnceLock;

static HOSTNAME_CACHE: OnceLock<String> = OnceLock::new();

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// Get an environment variable
///
/// Usage: `{{ env("PATH") }}`
pub fn env(name: &str) -> Cow<'static, str> {
    std::env::var(name).map_or(Cow::Borrowed(""), Cow::Owned)
}

/// Get the operating system name (`linux`, `darwin`, `windows`)
///
/// Usage: `{{ os() }}`
#[must_use]
pub fn os() -> &'static str {
    CURRENT_PLATFORM.os
}

/// Get the system architecture
///
/// Usage: `{{ arch() }}`
#[must_use]
pub fn arch() -> &'static str {
    CURRENT_PLATFORM.arch
}

/// Get the system hostname
///
/// Usage: `{{ hostname() }}`
pub fn hostname() -> &'static str {
    HOSTNAME_CACHE.get_or_init(detect_hostname)
}

pub(crate) fn detect_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Join path components
///
/// Usage: `{{ joinPath("/home", "user", ".config") }}`
#[must_use]
pub fn join_path(args: &[Value]) -> String {
    let mut path = PathBuf::new();
    for arg in args {
        if let Some(s) = arg.as_str() {
            path.push(s);
        }
    }
    path.to_string_lossy().into_owned()
}

/// Always wrap a string in double quotes with proper escaping
///
/// Usage: `{{ some_var | quote }}`
///
/// Examples:
/// - `hello` → `"hello"`
/// - `say "hi"` → `"say \"hi\""`
#[must_use]
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Convert a value to JSON
///
/// Usage: `{{ some_data | toJson }}`
pub fn to_json(value: &Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| invalid(e.to_string()))
}

/// Parse a JSON string
///
/// Usage: `{{ json_string | fromJson }}`
pub fn from_json(value: &str) -> Result<Value, Error> {
    let json_value: serde_json::Value =
        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok(Value::from_serialize(&json_value))
}

/// Convert a mapping to TOML
///
/// Usage: `{{ config | toToml }}`
pub fn to_toml(value: &Value) -> Result<String, Error> {
    let json_value = serde_json::to_value(value)
        .map_err(|e| invalid(format!("Failed to convert value: {e}")))?;
    toml::to_string(&json_value).map_err(|e| invalid(format!("Failed to serialize to TOML: {e}")))
}

/// Parse a TOML string
///
/// Usage: `{% set config = toml_text | fromToml %}`
pub fn from_toml(value: &str) -> Result<Value, Error> {
    let toml_value: toml::Value =
        toml::from_str(value).map_err(|e| invalid(format!("Failed to parse TOML: {e}")))?;
    let json_value = serde_json::to_value(&toml_value)
        .map_err(|e| invalid(format!("Failed to convert TOML to JSON: {e}")))?;
    Ok(Value::from_serialize(&json_value))
}

/// Trim whitespace from both ends of a string
///
/// Usage: `{{ "  hello  " | trim }}`
#[must_use]
pub fn trim(value: &str) -> String {
    value.trim().to_string()
}
