//! Bus agents for the reference runtime: one coordinator, any number of
//! workers.
//!
//! Message flow:
//!
//!   agents.coordinator.task  → Coordinator → agents.worker.request (request)
//!   agents.worker.request    → Worker      → agents.worker.response (inform)
//!   agents.worker.response   → Coordinator (recorded)

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};

use tracing::{debug, info, warn};

use concord_bus::{AgentIdentity, BusAgent, MessageSender};
use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::{AgentEvent, AgentMessage, Performative},
};

pub const COORDINATOR_TASK_TOPIC: &str = "agents.coordinator.task";
pub const WORKER_REQUEST_TOPIC: &str = "agents.worker.request";
pub const WORKER_RESPONSE_TOPIC: &str = "agents.worker.response";

fn decode_message(event: &AgentEvent) -> ConcordResult<AgentMessage> {
    event.message().ok_or_else(|| {
        ConcordError::handler(format!("event on '{}' carries no agent message", event.topic))
    })
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Hands incoming tasks to workers in round-robin order and collects their
/// responses.
pub struct CoordinatorAgent {
    identity: AgentIdentity,
    workers: Vec<String>,
    next: AtomicUsize,
    responses: Mutex<Vec<AgentMessage>>,
}

impl CoordinatorAgent {
    pub fn new(workers: Vec<String>) -> Self {
        Self {
            identity: AgentIdentity::new("CoordinatorAgent", "coordinator", "Allocate tasks to workers"),
            workers,
            next: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Worker responses received so far, in arrival order.
    pub fn responses(&self) -> Vec<AgentMessage> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_task(&self, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
        if self.workers.is_empty() {
            warn!("coordinator has no workers, dropping task");
            return Ok(());
        }
        let message = decode_message(event)?;
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let worker = &self.workers[slot];

        info!(worker = %worker, conversation = ?message.conversation_id(), "assigning task");
        sender.send(
            vec![worker.clone()],
            WORKER_REQUEST_TOPIC,
            &message.content,
            Some(Performative::Request),
            message.conversation_id().map(str::to_string),
            None,
        )
    }

    fn on_worker_response(&self, event: &AgentEvent) -> ConcordResult<()> {
        let message = decode_message(event)?;
        info!(
            from = %message.sender,
            conversation = ?message.conversation_id(),
            "coordinator received worker response"
        );
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

impl BusAgent for CoordinatorAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn subscribe_topics(&self) -> Vec<(String, String)> {
        vec![
            (COORDINATOR_TASK_TOPIC.to_string(), "on_task".to_string()),
            (WORKER_RESPONSE_TOPIC.to_string(), "on_worker_response".to_string()),
        ]
    }

    fn dispatch(&self, handler: &str, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
        match handler {
            "on_task" => self.on_task(event, sender),
            "on_worker_response" => self.on_worker_response(event),
            _ => self.handle_message(event, sender),
        }
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Answers requests addressed to it with `"Processed: <content>"`.
pub struct WorkerAgent {
    identity: AgentIdentity,
    handled: AtomicUsize,
}

impl WorkerAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: AgentIdentity::new(name, "worker", "Compute KPIs and summaries"),
            handled: AtomicUsize::new(0),
        }
    }

    /// Number of requests this worker has answered.
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::Relaxed)
    }

    fn on_request(&self, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
        let message = decode_message(event)?;

        // Requests are broadcast on one topic; only act on our own.
        if !message.recipients.is_empty() && !message.recipients.iter().any(|r| r == &self.identity.name) {
            return Ok(());
        }

        self.handled.fetch_add(1, Ordering::Relaxed);
        let reply = format!("Processed: {}", message.content);
        debug!(worker = %self.identity.name, "request processed");

        if message.sender.is_empty() {
            return Ok(());
        }
        sender.send(
            vec![message.sender.clone()],
            WORKER_RESPONSE_TOPIC,
            &reply,
            Some(Performative::Inform),
            message.conversation_id().map(str::to_string),
            None,
        )
    }
}

impl BusAgent for WorkerAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn subscribe_topics(&self) -> Vec<(String, String)> {
        vec![(WORKER_REQUEST_TOPIC.to_string(), "on_request".to_string())]
    }

    fn dispatch(&self, handler: &str, event: &AgentEvent, sender: &MessageSender) -> ConcordResult<()> {
        match handler {
            "on_request" => self.on_request(event, sender),
            _ => self.handle_message(event, sender),
        }
    }
}
