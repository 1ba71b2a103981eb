//! # concord-ref-supply
//!
//! Supply-chain reference runtime for the Concord multi-agent orchestration
//! core.
//!
//! Demonstrates three scenarios using mock data:
//!
//! 1. **Consolidated Inventory Planning**: a plan whose steps all route to
//!    one agent collapses into a single execution.
//! 2. **Multi-Agent Supplier Lookup**: a two-agent plan where the second
//!    step consumes the first step's answer, followed by a completion notice
//!    on the message bus.
//! 3. **Coordinated Agents on a Policy-Guarded Bus**: coordinator and worker
//!    agents exchanging FIPA messages under auth, protocol, and payload
//!    validation, with dead-lettering and clean shutdown.
//!
//! All data is hardcoded and fictional. No external services are contacted.

pub mod agents;
pub mod collaborators;
pub mod completion;
pub mod mock_data;
pub mod scenarios;
