//! Agent descriptor types.
//!
//! A descriptor is what the discovery collaborator tells us about a worker:
//! enough to route a task to it, nothing about how it runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Static description of one discoverable agent.
///
/// Descriptors are immutable per fetch. The orchestrator caches whole sets of
/// them and replaces the set atomically on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique display name, matched case-insensitively by the router.
    pub name: String,
    /// Business role (e.g. "Inventory Planner").
    pub role: String,
    /// Free-text purpose shown to the reasoning service when routing.
    #[serde(default)]
    pub purpose: String,
    /// Capability labels (e.g. "Summarize results", "Generate output as PPT").
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl AgentDescriptor {
    /// Build a descriptor with no capabilities.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            purpose: purpose.into(),
            capabilities: BTreeSet::new(),
        }
    }

    /// Add a capability label, builder-style.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Case-insensitive, whitespace-insensitive name comparison.
    pub fn name_matches(&self, candidate: &str) -> bool {
        self.name.trim().to_lowercase() == candidate.trim().to_lowercase()
    }

    /// Return true if the descriptor declares `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
