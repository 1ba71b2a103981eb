//! # concord-contracts
//!
//! Shared types, message envelopes, and error contracts for the Concord
//! runtime.
//!
//! All crates in the workspace import from here. No orchestration logic
//! lives in this crate, only data definitions and error types.

pub mod agent;
pub mod error;
pub mod message;
pub mod plan;
pub mod workflow;
