//! Bus event and agent-communication envelope types.
//!
//! Every bus delivery is an `AgentEvent`. Agent-to-agent traffic wraps an
//! `AgentMessage` inside the event payload under [`MESSAGE_PAYLOAD_KEY`];
//! the message optionally carries a FIPA-ACL style envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConcordError, ConcordResult};

/// Payload key under which an `AgentMessage` travels inside an event.
pub const MESSAGE_PAYLOAD_KEY: &str = "message";

/// Reserved topic namespace; events here must carry a performative.
pub const AGENT_TOPIC_PREFIX: &str = "agents.";

/// Topic receiving events whose handlers failed.
pub const DEAD_LETTER_TOPIC: &str = "deadletter";

/// Metadata key holding the shared bus auth token.
pub const AUTH_TOKEN_METADATA_KEY: &str = "auth_token";

/// Return true if `topic` lives under the reserved agent namespace.
pub fn is_agent_topic(topic: &str) -> bool {
    topic.starts_with(AGENT_TOPIC_PREFIX)
}

/// FIPA-ACL speech-act tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Performative {
    Inform,
    Request,
    Propose,
    Agree,
    Refuse,
    Confirm,
    Disconfirm,
    QueryIf,
    QueryRef,
    NotUnderstood,
}

impl std::fmt::Display for Performative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Performative::Inform => "inform",
            Performative::Request => "request",
            Performative::Propose => "propose",
            Performative::Agree => "agree",
            Performative::Refuse => "refuse",
            Performative::Confirm => "confirm",
            Performative::Disconfirm => "disconfirm",
            Performative::QueryIf => "query-if",
            Performative::QueryRef => "query-ref",
            Performative::NotUnderstood => "not-understood",
        };
        f.write_str(s)
    }
}

fn default_protocol() -> String {
    "fipa-acl".to_string()
}

/// Protocol envelope attached to an agent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FipaEnvelope {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub performative: Option<Performative>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub ontology: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub reply_with: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub reply_by: Option<String>,
}

impl FipaEnvelope {
    /// An envelope with only a performative and an optional conversation id.
    pub fn new(performative: Performative, conversation_id: Option<String>) -> Self {
        Self {
            protocol: default_protocol(),
            performative: Some(performative),
            language: None,
            ontology: None,
            conversation_id,
            reply_with: None,
            in_reply_to: None,
            reply_by: None,
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[default]
    Agent,
    System,
}

/// A message exchanged between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub topic: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub fipa: Option<FipaEnvelope>,
}

impl AgentMessage {
    /// A fresh message with a new id and the current UTC timestamp.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sender: sender.into(),
            recipients: Vec::new(),
            role: MessageRole::Agent,
            topic: None,
            content: content.into(),
            metadata: serde_json::Map::new(),
            fipa: None,
        }
    }

    pub fn to(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn on_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_fipa(mut self, envelope: FipaEnvelope) -> Self {
        self.fipa = Some(envelope);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn performative(&self) -> Option<Performative> {
        self.fipa.as_ref().and_then(|f| f.performative)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.fipa.as_ref().and_then(|f| f.conversation_id.as_deref())
    }
}

/// A single bus delivery.
///
/// Events are not persisted; they live for the duration of a publish call
/// and the handlers it triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl AgentEvent {
    /// A fresh event with a new id and the current UTC timestamp.
    pub fn new(
        topic: impl Into<String>,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.into(),
            payload,
            correlation_id: None,
        }
    }

    /// Wrap `message` under the `"message"` payload key.
    pub fn from_message(topic: impl Into<String>, message: &AgentMessage) -> ConcordResult<Self> {
        let value = serde_json::to_value(message).map_err(|e| ConcordError::PayloadRejected {
            reason: format!("agent message is not serializable: {e}"),
        })?;
        let mut payload = serde_json::Map::new();
        payload.insert(MESSAGE_PAYLOAD_KEY.to_string(), value);
        Ok(Self::new(topic, payload))
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The raw embedded message object, if present.
    pub fn message_value(&self) -> Option<&serde_json::Value> {
        self.payload.get(MESSAGE_PAYLOAD_KEY)
    }

    /// Decode the embedded message. `None` when absent or malformed.
    pub fn message(&self) -> Option<AgentMessage> {
        self.message_value()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
