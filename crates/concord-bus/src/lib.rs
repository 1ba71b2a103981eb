//! # concord-bus
//!
//! In-process publish/subscribe bus for Concord agents, plus the agent
//! lifecycle contract that sits on top of it.
//!
//! - `MessageBus` validates, queues, and delivers `AgentEvent`s by topic
//! - `BusAgent` / `AgentRuntime` subscribe an agent's handlers and remove
//!   them again on stop
//! - `MessageSender` builds protocol-conformant `AgentMessage`s

pub mod agent;
pub mod bus;

pub use agent::{AgentIdentity, AgentRuntime, BusAgent, MessageSender};
pub use bus::{BusConfig, DeadLetter, EventHandler, MessageBus, SubscriptionId};
