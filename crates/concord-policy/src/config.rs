//! Bus policy configuration.
//!
//! Deserialized from TOML. Every field is optional:
//!
//! ```toml
//! agent_topic_prefix = "agents."
//! max_payload_bytes = 65536
//! auth_token_env = "AGENT_COMM_TOKEN"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::AGENT_TOPIC_PREFIX,
};

/// Default payload ceiling: 64 KiB of serialized JSON.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Default environment variable holding the shared bus secret.
pub const DEFAULT_AUTH_TOKEN_ENV: &str = "AGENT_COMM_TOKEN";

fn default_agent_topic_prefix() -> String {
    AGENT_TOPIC_PREFIX.to_string()
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_auth_token_env() -> String {
    DEFAULT_AUTH_TOKEN_ENV.to_string()
}

/// Settings for the default validator chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Topics starting with this prefix must carry a FIPA performative.
    #[serde(default = "default_agent_topic_prefix")]
    pub agent_topic_prefix: String,

    /// Largest accepted payload, measured as compact JSON bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Environment variable the auth secret is read from.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            agent_topic_prefix: default_agent_topic_prefix(),
            max_payload_bytes: default_max_payload_bytes(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

impl PolicyConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `ConcordError::Config` if the TOML is malformed or a field has
    /// the wrong type.
    pub fn from_toml_str(s: &str) -> ConcordResult<Self> {
        toml::from_str(s).map_err(|e| ConcordError::Config {
            reason: format!("failed to parse policy TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML policy configuration.
    pub fn from_file(path: &Path) -> ConcordResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConcordError::Config {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
