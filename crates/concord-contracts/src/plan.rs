//! Plan and plan-step types, plus the tagged planning outcome.
//!
//! A `Plan` is an ordered decomposition of a user task. It is ephemeral: one
//! per task submission, consumed (never mutated) by the executor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output key used by the single-step fallback plan.
pub const FALLBACK_OUTPUT_KEY: &str = "answer";

/// One step of a plan.
///
/// `task` may embed `{output_key}` placeholders referring to earlier steps.
/// The executor substitutes into a new string; the step record itself is
/// never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Instruction text, possibly with `{key}` placeholders.
    pub task: String,
    /// Context key the step's answer is stored under. When absent the
    /// executor synthesizes `answer_<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Optional acceptance criterion for the refinement hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluate_criteria: Option<String>,
}

impl PlanStep {
    /// Build a step with an explicit output key.
    pub fn new(task: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output_key: Some(output_key.into()),
            evaluate_criteria: None,
        }
    }

    /// Attach an evaluation criterion, builder-style.
    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.evaluate_criteria = Some(criteria.into());
        self
    }
}

/// An ordered sequence of plan steps.
///
/// Serializes as a bare JSON array, the same shape the planner asks the
/// reasoning service to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Wrap an ordered list of steps.
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// The deterministic single-step plan used whenever planning fails.
    pub fn fallback(task: &str) -> Self {
        Self::new(vec![PlanStep::new(task.trim(), FALLBACK_OUTPUT_KEY)])
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter()
    }

    pub fn into_steps(self) -> Vec<PlanStep> {
        self.steps
    }

    /// Output keys that appear on more than one step, in sorted order.
    ///
    /// Duplicates are legal; later context writes overwrite earlier ones.
    pub fn duplicate_output_keys(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for key in self.steps.iter().filter_map(|s| s.output_key.as_deref()) {
            *counts.entry(key).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k.to_string())
            .collect()
    }
}

impl From<Vec<PlanStep>> for Plan {
    fn from(steps: Vec<PlanStep>) -> Self {
        Self::new(steps)
    }
}

/// Why the planner fell back to the default plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningFailure {
    /// There was nothing to plan.
    #[error("task is empty")]
    EmptyTask,

    /// The reasoning service returned empty text.
    #[error("reasoning service returned an empty plan")]
    EmptyResponse,

    /// The reasoning service call itself failed.
    #[error("reasoning service error: {0}")]
    Reasoning(String),

    /// The response was not valid JSON.
    #[error("plan is not valid JSON: {0}")]
    Malformed(String),

    /// The response was JSON but not a list of step objects.
    #[error("plan has the wrong shape: {0}")]
    InvalidShape(String),
}

/// The tagged result of a planning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The reasoning service produced a plan that decoded cleanly.
    Planned(Plan),
    /// Planning failed; `plan` is the single-step fallback.
    Fallback {
        plan: Plan,
        reason: PlanningFailure,
    },
}

impl PlanOutcome {
    /// Collapse either variant into the plan to execute.
    pub fn into_plan(self) -> Plan {
        match self {
            PlanOutcome::Planned(plan) | PlanOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback { .. })
    }
}
