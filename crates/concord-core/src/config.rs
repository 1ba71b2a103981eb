//! Orchestrator configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//!
//! ```toml
//! temperature = 0.0
//! discovery_ttl_secs = 300
//! context_preview_chars = 200
//! include_context_in_tasks = false
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use concord_contracts::error::{ConcordError, ConcordResult};

fn default_temperature() -> f32 {
    0.0
}

fn default_discovery_ttl_secs() -> u64 {
    300
}

fn default_context_preview_chars() -> usize {
    200
}

/// Tunables for planning, routing, discovery, and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Sampling temperature passed to the reasoning service.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// How long a successful discovery result is reused.
    #[serde(default = "default_discovery_ttl_secs")]
    pub discovery_ttl_secs: u64,

    /// Maximum characters of each context value echoed into prompts and logs.
    #[serde(default = "default_context_preview_chars")]
    pub context_preview_chars: usize,

    /// Append a preview of the accumulated context to every executed task.
    #[serde(default)]
    pub include_context_in_tasks: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            discovery_ttl_secs: default_discovery_ttl_secs(),
            context_preview_chars: default_context_preview_chars(),
            include_context_in_tasks: false,
        }
    }
}

impl WorkflowConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `ConcordError::Config` if the TOML is malformed or a field has
    /// the wrong type.
    pub fn from_toml_str(s: &str) -> ConcordResult<Self> {
        toml::from_str(s).map_err(|e| ConcordError::Config {
            reason: format!("failed to parse workflow TOML: {e}"),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> ConcordResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConcordError::Config {
            reason: format!("failed to read workflow config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(WorkflowConfig::from_toml_str("").unwrap(), WorkflowConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = WorkflowConfig::from_toml_str(
            "temperature = 0.3\ndiscovery_ttl_secs = 5\ninclude_context_in_tasks = true\n",
        )
        .unwrap();
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.discovery_ttl(), Duration::from_secs(5));
        assert_eq!(config.context_preview_chars, 200);
        assert!(config.include_context_in_tasks);
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let err = WorkflowConfig::from_toml_str("discovery_ttl_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConcordError::Config { .. }));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = WorkflowConfig::from_file(Path::new("/nonexistent/workflow.toml")).unwrap_err();
        assert!(matches!(err, ConcordError::Config { .. }));
    }
}
