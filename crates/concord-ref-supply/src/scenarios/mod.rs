//! Supply-chain reference runtime demo scenarios.
//!
//! Each scenario is a self-contained module that wires real Concord
//! components (planner, router, orchestrator, message bus, validator chain)
//! to the mock supply-chain data and demonstrates one coordination pattern.

pub mod bus_coordination;
pub mod consolidated_planning;
pub mod multi_agent_workflow;
