//! # concord-policy
//!
//! The default validator chain for the Concord message bus.
//!
//! ## Overview
//!
//! Three [`EventValidator`](concord_core::traits::EventValidator)s gate every
//! publish, in this order:
//!
//! 1. [`AuthValidator`]: shared-secret check on the embedded message
//! 2. [`ProtocolValidator`]: `agents.*` topics need a FIPA performative
//! 3. [`PayloadSizeValidator`]: serialized payload must fit the size limit
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use concord_policy::{register_default_policy, PolicyConfig};
//!
//! let bus = Arc::new(MessageBus::default());
//! register_default_policy(&bus, &PolicyConfig::from_file(Path::new("policies/bus.toml"))?);
//! ```

pub mod config;
pub mod validators;

use tracing::info;

use concord_bus::MessageBus;

pub use config::PolicyConfig;
pub use validators::{AuthValidator, PayloadSizeValidator, ProtocolValidator};

/// Register the default chain on `bus`, reading the auth secret from the
/// environment variable named by `config.auth_token_env`.
pub fn register_default_policy(bus: &MessageBus, config: &PolicyConfig) {
    for validator in validators::default_validators(config) {
        bus.add_validator(validator);
    }
    info!(prefix = %config.agent_topic_prefix, max_payload_bytes = config.max_payload_bytes, "default bus policy registered");
}

/// Register the default chain with an explicit auth secret.
pub fn register_policy_with_token(bus: &MessageBus, config: &PolicyConfig, auth_token: Option<String>) {
    for validator in validators::validators_with_token(config, auth_token) {
        bus.add_validator(validator);
    }
    info!(prefix = %config.agent_topic_prefix, max_payload_bytes = config.max_payload_bytes, "bus policy registered");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use concord_bus::{MessageBus, MessageSender};
    use concord_contracts::{
        error::ConcordError,
        message::{AgentEvent, AgentMessage, FipaEnvelope, Performative},
    };
    use concord_core::traits::EventValidator;

    use crate::{
        register_policy_with_token, AuthValidator, PayloadSizeValidator, PolicyConfig,
        ProtocolValidator,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn message_event(topic: &str, message: &AgentMessage) -> AgentEvent {
        AgentEvent::from_message(topic, message).unwrap()
    }

    fn with_token(message: AgentMessage, token: &str) -> AgentMessage {
        let mut metadata = serde_json::Map::new();
        metadata.insert("auth_token".to_string(), serde_json::json!(token));
        message.with_metadata(metadata)
    }

    fn counting_bus(topic: &str, token: Option<&str>) -> (Arc<MessageBus>, Arc<Mutex<u32>>) {
        let bus = Arc::new(MessageBus::default());
        register_policy_with_token(&bus, &PolicyConfig::default(), token.map(str::to_string));
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        bus.subscribe(topic, move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        (bus, count)
    }

    // ── 1. config ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_toml_uses_defaults() {
        let config = PolicyConfig::from_toml_str("").unwrap();
        assert_eq!(config, PolicyConfig::default());
        assert_eq!(config.agent_topic_prefix, "agents.");
        assert_eq!(config.max_payload_bytes, 65536);
        assert_eq!(config.auth_token_env, "AGENT_COMM_TOKEN");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = PolicyConfig::from_toml_str("max_payload_bytes = \"lots\"").unwrap_err();
        assert!(matches!(err, ConcordError::Config { .. }));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = PolicyConfig::from_file(std::path::Path::new("/nonexistent/bus.toml")).unwrap_err();
        assert!(matches!(err, ConcordError::Config { .. }));
    }

    // ── 2. auth ───────────────────────────────────────────────────────────────

    #[test]
    fn auth_without_secret_accepts_everything() {
        let v = AuthValidator::new(None);
        assert!(!v.is_enabled());
        let event = message_event("status.ping", &AgentMessage::new("a", "hi"));
        assert!(v.validate(&event).is_ok());
        assert!(AuthValidator::new(Some(String::new())).validate(&event).is_ok());
    }

    #[test]
    fn auth_requires_matching_token() {
        let v = AuthValidator::new(Some("s3cret".to_string()));

        let good = message_event("status.ping", &with_token(AgentMessage::new("a", "hi"), "s3cret"));
        assert!(v.validate(&good).is_ok());

        let wrong = message_event("status.ping", &with_token(AgentMessage::new("a", "hi"), "guess"));
        assert!(matches!(v.validate(&wrong), Err(ConcordError::Unauthorized { .. })));

        let missing = message_event("status.ping", &AgentMessage::new("a", "hi"));
        assert!(matches!(v.validate(&missing), Err(ConcordError::Unauthorized { .. })));

        let bare = AgentEvent::new("status.ping", serde_json::Map::new());
        assert!(matches!(v.validate(&bare), Err(ConcordError::Unauthorized { .. })));
    }

    #[test]
    fn env_secret_is_read_once_when_the_chain_is_built() {
        let var = "CONCORD_TEST_BUS_SECRET_READ_ONCE";
        std::env::set_var(var, "first");
        let config = PolicyConfig {
            auth_token_env: var.to_string(),
            ..PolicyConfig::default()
        };
        let chain = crate::validators::default_validators(&config);
        std::env::set_var(var, "second");

        let auth = &chain[0];
        assert_eq!(auth.name(), "auth");
        let first = message_event("status.ping", &with_token(AgentMessage::new("a", "hi"), "first"));
        let second = message_event("status.ping", &with_token(AgentMessage::new("a", "hi"), "second"));
        assert!(auth.validate(&first).is_ok());
        assert!(matches!(auth.validate(&second), Err(ConcordError::Unauthorized { .. })));

        std::env::remove_var(var);
        assert!(auth.validate(&first).is_ok());
        assert!(AuthValidator::from_env(var).validate(&second).is_ok());
    }

    // ── 3. protocol ───────────────────────────────────────────────────────────

    #[test]
    fn agent_topics_need_a_performative() {
        let v = ProtocolValidator::new("agents.");

        let plain = message_event("agents.worker.request", &AgentMessage::new("a", "hi"));
        assert!(matches!(v.validate(&plain), Err(ConcordError::ProtocolViolation { .. })));

        let tagged = message_event(
            "agents.worker.request",
            &AgentMessage::new("a", "hi").with_fipa(FipaEnvelope::new(Performative::Request, None)),
        );
        assert!(v.validate(&tagged).is_ok());

        let other = message_event("status.ping", &AgentMessage::new("a", "hi"));
        assert!(v.validate(&other).is_ok());
    }

    // ── 4. payload size ───────────────────────────────────────────────────────

    #[test]
    fn oversized_payload_is_rejected() {
        let v = PayloadSizeValidator::default();
        let small = message_event("status.ping", &AgentMessage::new("a", "hi"));
        assert!(v.validate(&small).is_ok());

        let big = message_event("status.ping", &AgentMessage::new("a", "x".repeat(70 * 1024)));
        assert!(matches!(v.validate(&big), Err(ConcordError::PayloadRejected { .. })));

        let tight = PayloadSizeValidator::new(10);
        assert!(tight.validate(&small).is_err());
    }

    #[test]
    fn payload_limit_is_inclusive() {
        let event = message_event("status.ping", &AgentMessage::new("a", "x".repeat(500)));
        let size = serde_json::to_vec(&event.payload).unwrap().len();

        assert!(PayloadSizeValidator::new(size).validate(&event).is_ok());
        assert!(matches!(
            PayloadSizeValidator::new(size - 1).validate(&event),
            Err(ConcordError::PayloadRejected { .. })
        ));
    }

    // ── 5. chain on a live bus ────────────────────────────────────────────────

    #[test]
    fn mismatched_token_invokes_no_handlers() {
        let (bus, count) = counting_bus("agents.worker.request", Some("s3cret"));
        let sender = MessageSender::new("Coordinator", &bus, Some("wrong".to_string()));

        let err = sender
            .send(
                vec!["Worker".to_string()],
                "agents.worker.request",
                "count bolts",
                Some(Performative::Request),
                None,
                None,
            )
            .unwrap_err();

        assert!(matches!(err, ConcordError::Unauthorized { .. }));
        assert_eq!(*count.lock().unwrap(), 0);
        assert!(bus.dead_letters().is_empty());
    }

    #[test]
    fn matching_token_is_delivered() {
        let (bus, count) = counting_bus("agents.worker.request", Some("s3cret"));
        let sender = MessageSender::new("Coordinator", &bus, Some("s3cret".to_string()));
        sender
            .send(vec![], "agents.worker.request", "count bolts", Some(Performative::Request), None, None)
            .unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn raw_agent_topic_event_without_performative_is_blocked() {
        let (bus, count) = counting_bus("agents.worker.request", None);
        let event = message_event("agents.worker.request", &AgentMessage::new("a", "hi"));
        let err = bus.publish(event).unwrap_err();
        assert!(matches!(err, ConcordError::ProtocolViolation { .. }));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn auth_runs_before_protocol() {
        let (bus, _) = counting_bus("agents.worker.request", Some("s3cret"));
        let event = message_event("agents.worker.request", &AgentMessage::new("a", "hi"));
        let err = bus.publish(event).unwrap_err();
        assert!(matches!(err, ConcordError::Unauthorized { .. }));
    }
}
