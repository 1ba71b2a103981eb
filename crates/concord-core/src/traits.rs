//! Collaborator trait definitions for the Concord runtime.
//!
//! These traits are the whole boundary between the orchestration core and
//! the outside world:
//!
//! - `ReasoningService`: text completion (planning and routing prompts)
//! - `AgentDirectory`: discovery of worker agent descriptors
//! - `TaskExecutor`: runs one task on one agent
//! - `PlanDecoder`: strict decoding of raw planner output
//! - `ResultEvaluator`: acceptance check for the refinement hook
//! - `EventValidator`: policy gate run before every bus dispatch
//!
//! Implementations may block and may hit the network. The core never
//! enforces timeouts; that is the collaborator's job.

use concord_contracts::{
    agent::AgentDescriptor,
    error::ConcordResult,
    message::AgentEvent,
    plan::{Plan, PlanningFailure},
    workflow::ExecutionOutcome,
};

/// A text-completion service (typically an LLM).
pub trait ReasoningService: Send + Sync {
    /// Complete `prompt` at the given sampling temperature.
    ///
    /// The planner expects a JSON array back; the router expects a bare
    /// agent name. Both recover locally from any error returned here.
    fn complete(&self, prompt: &str, temperature: f32) -> ConcordResult<String>;
}

/// Source of the full set of discoverable agents.
pub trait AgentDirectory: Send + Sync {
    /// Return every agent currently known to the directory.
    ///
    /// Errors are logged by the discovery cache and treated as "no agents".
    fn list_agents(&self) -> ConcordResult<Vec<AgentDescriptor>>;
}

/// Runs a single task, optionally pinned to a named agent.
pub trait TaskExecutor: Send + Sync {
    /// Execute `task`. An `Err` is converted by the orchestrator into an
    /// outcome carrying an `error` field; it never aborts a workflow.
    fn execute(&self, task: &str, agent_name: Option<&str>) -> ConcordResult<ExecutionOutcome>;
}

/// Turns raw reasoning-service text into a validated plan.
pub trait PlanDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<Plan, PlanningFailure>;
}

/// Decides whether an execution outcome satisfies a step's criteria.
///
/// A rejected outcome triggers exactly one refinement retry.
pub trait ResultEvaluator: Send + Sync {
    fn accepts(&self, outcome: &ExecutionOutcome, criteria: &str) -> bool;
}

/// The shipped evaluator: every outcome is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ResultEvaluator for AcceptAll {
    fn accepts(&self, _outcome: &ExecutionOutcome, _criteria: &str) -> bool {
        true
    }
}

/// A pure, stateless check run against every event before dispatch.
///
/// Validators run in registration order; the first `Err` aborts the publish
/// and is returned to the publisher unchanged.
pub trait EventValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn validate(&self, event: &AgentEvent) -> ConcordResult<()>;
}
