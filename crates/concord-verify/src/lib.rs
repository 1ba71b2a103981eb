//! # concord-verify
//!
//! Structural verification of reasoning-service output for the Concord
//! runtime.
//!
//! This crate provides [`decoder::SchemaPlanDecoder`], which implements the
//! [`concord_core::traits::PlanDecoder`] trait. Raw planner text is
//! unfenced, parsed, validated against a JSON Schema via the `jsonschema`
//! crate, and only then deserialized into a `Plan`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use concord_verify::SchemaPlanDecoder;
//!
//! let decoder = SchemaPlanDecoder::new()?;
//! let planner = TaskPlanner::new(reasoning, Box::new(decoder));
//! ```

pub mod decoder;

pub use decoder::{plan_schema, strip_code_fence, SchemaPlanDecoder};
