//! The three default bus validators.
//!
//! Each is a pure check over one `AgentEvent`. None of them mutate the event
//! or keep state between calls.

use tracing::{debug, warn};

use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::{AgentEvent, AUTH_TOKEN_METADATA_KEY, MESSAGE_PAYLOAD_KEY},
};
use concord_core::traits::EventValidator;

use crate::config::{PolicyConfig, DEFAULT_MAX_PAYLOAD_BYTES};

// ── Auth ──────────────────────────────────────────────────────────────────────

/// Requires `payload.message.metadata.auth_token` to equal a shared secret.
///
/// Without a secret the validator accepts everything.
#[derive(Debug, Clone, Default)]
pub struct AuthValidator {
    expected: Option<String>,
}

impl AuthValidator {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|t| !t.is_empty()),
        }
    }

    /// Read the secret from `var` once. Unset or empty means auth is off.
    pub fn from_env(var: &str) -> Self {
        let token = std::env::var(var).ok();
        debug!(env = %var, enabled = token.as_deref().is_some_and(|t| !t.is_empty()), "auth validator configured");
        Self::new(token)
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }
}

impl EventValidator for AuthValidator {
    fn name(&self) -> &str {
        "auth"
    }

    fn validate(&self, event: &AgentEvent) -> ConcordResult<()> {
        let Some(expected) = self.expected.as_deref() else {
            return Ok(());
        };

        let presented = event
            .payload
            .get(MESSAGE_PAYLOAD_KEY)
            .and_then(|m| m.get("metadata"))
            .and_then(|md| md.get(AUTH_TOKEN_METADATA_KEY))
            .and_then(|t| t.as_str());

        if presented == Some(expected) {
            return Ok(());
        }

        warn!(topic = %event.topic, event_id = %event.id, token_present = presented.is_some(), "auth token rejected");
        Err(ConcordError::Unauthorized {
            reason: match presented {
                Some(_) => "auth token does not match".to_string(),
                None => "auth token missing from message metadata".to_string(),
            },
        })
    }
}

// ── Protocol ──────────────────────────────────────────────────────────────────

/// Reserved-namespace topics must carry `payload.message.fipa.performative`.
#[derive(Debug, Clone)]
pub struct ProtocolValidator {
    prefix: String,
}

impl ProtocolValidator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl EventValidator for ProtocolValidator {
    fn name(&self) -> &str {
        "protocol"
    }

    fn validate(&self, event: &AgentEvent) -> ConcordResult<()> {
        if !event.topic.starts_with(&self.prefix) {
            return Ok(());
        }

        let performative = event
            .payload
            .get(MESSAGE_PAYLOAD_KEY)
            .and_then(|m| m.get("fipa"))
            .and_then(|f| f.get("performative"))
            .filter(|p| !p.is_null());

        if performative.is_some() {
            return Ok(());
        }

        warn!(topic = %event.topic, event_id = %event.id, "agent topic event without performative");
        Err(ConcordError::ProtocolViolation {
            reason: format!(
                "events on '{}*' topics require message.fipa.performative (topic '{}')",
                self.prefix, event.topic
            ),
        })
    }
}

// ── Payload size ──────────────────────────────────────────────────────────────

/// Caps the compact JSON encoding of the event payload.
#[derive(Debug, Clone)]
pub struct PayloadSizeValidator {
    max_bytes: usize,
}

impl PayloadSizeValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for PayloadSizeValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl EventValidator for PayloadSizeValidator {
    fn name(&self) -> &str {
        "payload-size"
    }

    fn validate(&self, event: &AgentEvent) -> ConcordResult<()> {
        let encoded = serde_json::to_vec(&event.payload).map_err(|e| ConcordError::PayloadRejected {
            reason: format!("payload is not serializable: {e}"),
        })?;

        if encoded.len() > self.max_bytes {
            warn!(
                topic = %event.topic,
                event_id = %event.id,
                bytes = encoded.len(),
                limit = self.max_bytes,
                "payload too large"
            );
            return Err(ConcordError::PayloadRejected {
                reason: format!("payload is {} bytes, limit is {}", encoded.len(), self.max_bytes),
            });
        }
        Ok(())
    }
}

/// The default chain in registration order: auth, protocol, payload size.
///
/// The auth secret is read from `config.auth_token_env` once, here.
pub fn default_validators(config: &PolicyConfig) -> Vec<Box<dyn EventValidator>> {
    chain(config, AuthValidator::from_env(&config.auth_token_env))
}

/// Like [`default_validators`], with an explicit secret instead of the
/// environment.
pub fn validators_with_token(
    config: &PolicyConfig,
    auth_token: Option<String>,
) -> Vec<Box<dyn EventValidator>> {
    chain(config, AuthValidator::new(auth_token))
}

fn chain(config: &PolicyConfig, auth: AuthValidator) -> Vec<Box<dyn EventValidator>> {
    vec![
        Box::new(auth),
        Box::new(ProtocolValidator::new(config.agent_topic_prefix.clone())),
        Box::new(PayloadSizeValidator::new(config.max_payload_bytes)),
    ]
}
