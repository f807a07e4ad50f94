//! Expansion settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;

/// Default name of the module being compiled.
pub const DEFAULT_MODULE: &str = "__main__";

/// Settings shared by the expander, the compiler and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Maximum expansion steps on a single form. `None` means unbounded.
    pub step_limit: Option<usize>,
    /// Record a [`MacroExpansionStep`](crate::macros::MacroExpansionStep) per step.
    pub record_trace: bool,
    /// Module name used for macro lookup and compilation.
    pub module: String,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            step_limit: None,
            record_trace: false,
            module: DEFAULT_MODULE.to_string(),
        }
    }
}

impl ExpansionConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ExpansionConfig::from_json(r#"{"step_limit": 5}"#).unwrap();
        assert_eq!(config.step_limit, Some(5));
        assert_eq!(config.module, DEFAULT_MODULE);
        assert!(!config.record_trace);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ExpansionConfig::from_json("{step_limit"),
            Err(ConfigError::Json(_))
        ));
    }
}
