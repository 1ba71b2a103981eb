//! The bus-facing agent contract.
//!
//! An agent declares which topics it listens on and which of its handlers
//! each topic maps to. `AgentRuntime` does the plumbing: it subscribes on
//! `start()`, unsubscribes on `stop()`, and hands every handler a
//! `MessageSender` bound to the agent's name and the bus auth token.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, info, warn};

use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::{
        is_agent_topic, AgentEvent, AgentMessage, FipaEnvelope, Performative,
        AUTH_TOKEN_METADATA_KEY,
    },
};

use crate::bus::{MessageBus, SubscriptionId};

/// Name, role, and purpose of a bus agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub role: String,
    pub purpose: String,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, role: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            purpose: purpose.into(),
        }
    }
}

/// An agent that lives on the message bus.
///
/// Implementations are shared across handler invocations, so any mutable
/// state needs interior mutability.
pub trait BusAgent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    /// `(topic, handler name)` pairs to subscribe on start.
    fn subscribe_topics(&self) -> Vec<(String, String)>;

    /// Route an event to the named handler. Unknown names should fall
    /// through to `handle_message`.
    fn dispatch(&self, handler: &str, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
        debug!(agent = %self.identity().name, handler = %handler, "no dedicated handler");
        self.handle_message(event, sender)
    }

    /// Catch-all handler. Does nothing unless overridden.
    fn handle_message(&self, _event: &AgentEvent, _sender: &MessageSender) -> ConcordResult<()> {
        Ok(())
    }
}

/// Publishes messages on behalf of one agent.
#[derive(Clone)]
pub struct MessageSender {
    name: String,
    bus: Weak<MessageBus>,
    auth_token: Option<String>,
}

impl MessageSender {
    pub fn new(name: impl Into<String>, bus: &Arc<MessageBus>, auth_token: Option<String>) -> Self {
        Self {
            name: name.into(),
            bus: Arc::downgrade(bus),
            auth_token,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `content` in an `AgentMessage` and publish it on `topic`.
    ///
    /// Topics in the reserved `agents.` namespace require a performative.
    /// The configured auth token, if any, is added to the metadata.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` for a reserved topic without a performative,
    /// `BusUnavailable` if the bus has been dropped, and any validator error
    /// from `MessageBus::publish`.
    pub fn send(
        &self,
        recipients: Vec<String>,
        topic: &str,
        content: &str,
        performative: Option<Performative>,
        conversation_id: Option<String>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> ConcordResult<()> {
        if is_agent_topic(topic) && performative.is_none() {
            return Err(ConcordError::ProtocolViolation {
                reason: format!("performative is required for agent topic '{topic}'"),
            });
        }

        let bus = self.bus.upgrade().ok_or_else(|| ConcordError::BusUnavailable {
            reason: format!("agent '{}' outlived its bus", self.name),
        })?;

        let mut metadata = metadata.unwrap_or_default();
        if let Some(token) = &self.auth_token {
            metadata.insert(
                AUTH_TOKEN_METADATA_KEY.to_string(),
                serde_json::Value::String(token.clone()),
            );
        }

        let mut message = AgentMessage::new(self.name.as_str(), content)
            .to(recipients)
            .on_topic(topic)
            .with_metadata(metadata);
        if let Some(performative) = performative {
            message = message.with_fipa(FipaEnvelope::new(performative, conversation_id));
        }

        let mut event = AgentEvent::from_message(topic, &message)?;
        if let Some(cid) = message.conversation_id() {
            event = event.with_correlation_id(cid);
        }

        debug!(
            sender = %self.name,
            topic = %topic,
            performative = ?performative,
            "sending agent message"
        );
        bus.publish(event)
    }
}

#[derive(Default)]
struct RuntimeState {
    running: bool,
    subscriptions: Vec<SubscriptionId>,
}

/// Lifecycle wrapper binding a `BusAgent` to a bus.
pub struct AgentRuntime {
    agent: Arc<dyn BusAgent>,
    bus: Weak<MessageBus>,
    sender: MessageSender,
    state: Mutex<RuntimeState>,
}

impl AgentRuntime {
    pub fn new(agent: Arc<dyn BusAgent>, bus: &Arc<MessageBus>, auth_token: Option<String>) -> Self {
        let sender = MessageSender::new(agent.identity().name.clone(), bus, auth_token);
        Self {
            agent,
            bus: Arc::downgrade(bus),
            sender,
            state: Mutex::new(RuntimeState::default()),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        self.agent.identity()
    }

    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).running
    }

    /// Subscribe every declared topic. Calling `start` on a running agent
    /// does nothing.
    pub fn start(&self) -> ConcordResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.running {
            return Ok(());
        }

        let bus = self.bus.upgrade().ok_or_else(|| ConcordError::BusUnavailable {
            reason: format!("cannot start agent '{}': bus dropped", self.identity().name),
        })?;

        for (topic, handler) in self.agent.subscribe_topics() {
            let agent = self.agent.clone();
            let sender = self.sender.clone();
            let handler_name = handler.clone();
            let id = bus.subscribe(topic.clone(), move |event: &AgentEvent| {
                agent.dispatch(&handler_name, event, &sender)
            });
            debug!(agent = %self.identity().name, topic = %topic, handler = %handler, "agent subscribed");
            state.subscriptions.push(id);
        }

        state.running = true;
        info!(
            agent = %self.identity().name,
            topics = state.subscriptions.len(),
            "agent started"
        );
        Ok(())
    }

    /// Remove every subscription made by `start`. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.running {
            return;
        }

        let ids = std::mem::take(&mut state.subscriptions);
        match self.bus.upgrade() {
            Some(bus) => {
                for id in ids {
                    bus.unsubscribe(id);
                }
            }
            None => warn!(agent = %self.identity().name, "bus already dropped on stop"),
        }

        state.running = false;
        info!(agent = %self.identity().name, "agent stopped");
    }

    /// Send as this agent. See [`MessageSender::send`].
    pub fn send(
        &self,
        recipients: Vec<String>,
        topic: &str,
        content: &str,
        performative: Option<Performative>,
        conversation_id: Option<String>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> ConcordResult<()> {
        self.sender
            .send(recipients, topic, content, performative, conversation_id, metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use concord_contracts::{
        error::{ConcordError, ConcordResult},
        message::{AgentEvent, Performative},
    };

    use crate::bus::MessageBus;

    use super::*;

    /// Records the content of every message it receives, per handler.
    struct EchoAgent {
        identity: AgentIdentity,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl EchoAgent {
        fn new() -> Self {
            Self {
                identity: AgentIdentity::new("EchoAgent", "tester", "Echo messages"),
                seen: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl BusAgent for EchoAgent {
        fn identity(&self) -> &AgentIdentity {
            &self.identity
        }

        fn subscribe_topics(&self) -> Vec<(String, String)> {
            vec![
                ("agents.echo.request".to_string(), "on_request".to_string()),
                ("echo.other".to_string(), "unknown_handler".to_string()),
            ]
        }

        fn dispatch(&self, handler: &str, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
            match handler {
                "on_request" => {
                    let content = event.message().map(|m| m.content).unwrap_or_default();
                    self.seen.lock().unwrap().push((handler.to_string(), content));
                    Ok(())
                }
                _ => self.handle_message(event, sender),
            }
        }
    }

    /// Uses only the default dispatch/handle_message.
    struct SilentAgent {
        identity: AgentIdentity,
    }

    impl BusAgent for SilentAgent {
        fn identity(&self) -> &AgentIdentity {
            &self.identity
        }

        fn subscribe_topics(&self) -> Vec<(String, String)> {
            vec![("silent.topic".to_string(), "whatever".to_string())]
        }
    }

    #[test]
    fn start_subscribes_and_stop_unsubscribes() {
        let bus = Arc::new(MessageBus::default());
        let agent = EchoAgent::new();
        let seen = agent.seen.clone();
        let runtime = AgentRuntime::new(Arc::new(agent), &bus, None);

        runtime.start().unwrap();
        runtime.start().unwrap();
        assert!(runtime.is_running());
        assert_eq!(bus.subscriber_count("agents.echo.request"), 1, "start is idempotent");

        runtime
            .send(vec![], "agents.echo.request", "hello", Some(Performative::Request), None, None)
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![("on_request".to_string(), "hello".to_string())]);

        runtime.stop();
        runtime.stop();
        assert!(!runtime.is_running());
        assert_eq!(bus.subscriber_count("agents.echo.request"), 0);
        assert_eq!(bus.subscriber_count("echo.other"), 0);

        runtime
            .send(vec![], "agents.echo.request", "ignored", Some(Performative::Request), None, None)
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn agent_topic_without_performative_is_rejected() {
        let bus = Arc::new(MessageBus::default());
        let sender = MessageSender::new("tester", &bus, None);
        let err = sender
            .send(vec![], "agents.echo.request", "hi", None, None, None)
            .unwrap_err();
        assert!(matches!(err, ConcordError::ProtocolViolation { .. }));

        sender.send(vec![], "status.ping", "hi", None, None, None).unwrap();
    }

    #[test]
    fn send_injects_token_and_envelope() {
        let bus = Arc::new(MessageBus::default());
        let captured = Arc::new(Mutex::new(vec![]));
        let c = captured.clone();
        bus.subscribe("agents.worker.request", move |e| {
            c.lock().unwrap().push(e.clone());
            Ok(())
        });

        let sender = MessageSender::new("Coordinator", &bus, Some("s3cret".to_string()));
        sender
            .send(
                vec!["Worker".to_string()],
                "agents.worker.request",
                "count bolts",
                Some(Performative::Request),
                Some("conv-1".to_string()),
                None,
            )
            .unwrap();

        let events = captured.lock().unwrap();
        let event = &events[0];
        assert_eq!(event.correlation_id.as_deref(), Some("conv-1"));
        let message = event.message().unwrap();
        assert_eq!(message.sender, "Coordinator");
        assert_eq!(message.recipients, vec!["Worker".to_string()]);
        assert_eq!(message.metadata["auth_token"], "s3cret");
        assert_eq!(message.performative(), Some(Performative::Request));
        assert_eq!(message.conversation_id(), Some("conv-1"));
    }

    #[test]
    fn default_handler_is_a_no_op() {
        let bus = Arc::new(MessageBus::default());
        let runtime = AgentRuntime::new(
            Arc::new(SilentAgent {
                identity: AgentIdentity::new("Silent", "none", "Nothing"),
            }),
            &bus,
            None,
        );
        runtime.start().unwrap();
        runtime.send(vec![], "silent.topic", "x", None, None, None).unwrap();
        assert!(bus.dead_letters().is_empty());
    }

    #[test]
    fn dropped_bus_is_reported() {
        let bus = Arc::new(MessageBus::default());
        let sender = MessageSender::new("tester", &bus, None);
        drop(bus);
        let err = sender.send(vec![], "status.ping", "hi", None, None, None).unwrap_err();
        assert!(matches!(err, ConcordError::BusUnavailable { .. }));
    }
}
