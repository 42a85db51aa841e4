//! Template context management
//!
//! The context provides data that is available to templates during rendering
//! and to manifest `condition` expressions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Context data available to templates
///
/// Variables are flattened into the top level so templates can write
/// `{{ my_var }}` instead of `{{ variables.my_var }}`. The reserved keys
/// (`system`, `env`, `variant`, `configs`) always take precedence over a
/// variable of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    /// System information
    pub system: SystemInfo,

    /// Environment variables
    pub env: IndexMap<String, String>,

    /// Active variant (empty when none is selected)
    pub variant: String,

    /// Merged configuration data
    pub configs: Map<String, JsonValue>,

    /// Merged variable data
    pub variables: Map<String, JsonValue>,
}

/// System information available to templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system (`linux`, `darwin`, `windows`)
    pub os: String,

    /// Operating system family (`unix`, `windows`)
    #[serde(rename = "osFamily")]
    pub os_family: String,

    /// Architecture (e.g. `x86_64`, `aarch64`)
    pub arch: String,

    /// Host name
    pub hostname: String,

    /// Login name
    pub username: String,

    /// Home directory path
    #[serde(rename = "homeDir")]
    pub home_dir: String,
}

impl TemplateContext {
    /// Create a new context with system information and the process environment
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: SystemInfo::detect(),
            env: std::env::vars().collect(),
            variant: String::new(),
            configs: Map::new(),
            variables: Map::new(),
        }
    }

    /// Set the selected variant
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    /// Set the merged variables, exposed at the top level
    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, JsonValue>) -> Self {
        self.variables = variables;
        self
    }

    /// Set the decoded configs
    #[must_use]
    pub fn with_configs(mut self, configs: Map<String, JsonValue>) -> Self {
        self.configs = configs;
        self
    }

    /// Build the JSON object handed to the template engine
    pub fn to_value(&self) -> JsonValue {
        let mut map = self.variables.clone();
        map.insert(
            "system".to_string(),
            serde_json::to_value(&self.system).unwrap_or(JsonValue::Null),
        );
        map.insert(
            "env".to_string(),
            JsonValue::Object(
                self.env
                    .iter()
                    .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                    .collect(),
            ),
        );
        map.insert("variant".to_string(), JsonValue::String(self.variant.clone()));
        map.insert("configs".to_string(), JsonValue::Object(self.configs.clone()));
        JsonValue::Object(map)
    }
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfo {
    /// Detect system information
    #[must_use]
    pub fn detect() -> Self {
        let platform = &*rcm_core::platform::CURRENT_PLATFORM;

        Self {
            os: platform.os.to_string(),
            os_family: std::env::consts::FAMILY.to_string(),
            arch: platform.arch.to_string(),
            hostname: crate::functions::hostname().to_string(),
            username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            home_dir: dirs::home_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}
