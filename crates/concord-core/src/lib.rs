//! # concord-core
//!
//! The orchestration core for Concord agents.
//!
//! This crate provides:
//! - The collaborator traits (`ReasoningService`, `AgentDirectory`,
//!   `TaskExecutor`, `PlanDecoder`, `ResultEvaluator`, `EventValidator`)
//! - The `TaskPlanner`, `AgentRouter`, and consolidation helpers
//! - The `Orchestrator` that wires them into a sequential workflow run
//!
//! ## Usage
//!
//! ```rust,ignore
//! use concord_core::{Orchestrator, WorkflowConfig};
//!
//! let orchestrator = Orchestrator::new(reasoning, decoder, directory, executor, WorkflowConfig::default());
//! let report = orchestrator.plan_and_run("Check inventory turnover", None)?;
//! ```

pub mod config;
pub mod consolidator;
pub mod discovery;
pub mod orchestrator;
pub mod planner;
pub mod router;
pub mod template;
pub mod traits;

pub use config::WorkflowConfig;
pub use orchestrator::Orchestrator;
pub use planner::TaskPlanner;
pub use router::AgentRouter;
