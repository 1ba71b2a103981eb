//! Runtime error types for the Concord orchestration pipeline.
//!
//! All fallible operations in Concord return `ConcordResult<T>`. Most
//! collaborator failures are recovered locally by the planner, router, and
//! executor; the variants here are what still reaches a caller.

use thiserror::Error;

/// The unified error type for the Concord runtime.
#[derive(Debug, Error)]
pub enum ConcordError {
    /// The reasoning collaborator failed or returned nothing usable.
    #[error("reasoning service failed: {reason}")]
    Reasoning { reason: String },

    /// The agent directory could not be reached or returned garbage.
    #[error("agent discovery failed: {reason}")]
    Discovery { reason: String },

    /// The single-task execution collaborator raised.
    #[error("task execution failed: {reason}")]
    Execution { reason: String },

    /// Discovery (after filtering) produced no agents. Fatal for a workflow run.
    #[error("no agents available for workflow execution")]
    NoAgentsAvailable,

    /// The event's auth token did not match the configured shared secret.
    #[error("unauthorized event: {reason}")]
    Unauthorized { reason: String },

    /// An event or message broke the agent communication protocol.
    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// The event payload was unserializable or over the size limit.
    #[error("payload rejected: {reason}")]
    PayloadRejected { reason: String },

    /// A bus handler failed while processing an event.
    #[error("event handler failed: {reason}")]
    Handler { reason: String },

    /// The bus an agent was bound to has been dropped.
    #[error("message bus unavailable: {reason}")]
    BusUnavailable { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl ConcordError {
    /// Shorthand for handler implementations that fail with a message.
    pub fn handler(reason: impl Into<String>) -> Self {
        Self::Handler {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Concord crates.
pub type ConcordResult<T> = Result<T, ConcordError>;
