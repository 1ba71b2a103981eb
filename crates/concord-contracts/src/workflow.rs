//! Workflow execution results and the per-run context.
//!
//! `StepResult` is what the executor emits for every original plan step.
//! `WorkflowContext` threads answers from earlier groups into later steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plan::Plan;

/// Agent name recorded on results that never reached an agent.
pub const UNASSIGNED_AGENT: &str = "N/A";

/// Result map returned by the execution collaborator.
///
/// `answer` and `error` are the two fields the executor reads. Anything else
/// the collaborator returns (SQL, preview rows, file paths) is kept verbatim
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionOutcome {
    /// A successful outcome carrying only an answer.
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Self::default()
        }
    }

    /// A failed outcome carrying only an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach an extra field, builder-style.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The answer, if the outcome succeeded and the answer is non-empty.
    ///
    /// Only these answers are written back into the workflow context.
    pub fn usable_answer(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.answer.as_deref().filter(|a| !a.is_empty())
    }
}

/// The outcome of one original plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Agent that executed the step, or `"N/A"` if it never dispatched.
    pub agent: String,
    /// Task text after placeholder substitution.
    pub task: String,
    /// The step's declared output key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// The collaborator's result (shared by all steps of a merged group).
    pub result: ExecutionOutcome,
}

impl StepResult {
    /// A result for a step that failed before any agent was invoked.
    pub fn unassigned(
        task: impl Into<String>,
        output_key: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent: UNASSIGNED_AGENT.to_string(),
            task: task.into(),
            output_key,
            result: ExecutionOutcome::failed(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.result.is_error()
    }
}

/// Accumulated `output_key -> answer` mapping for one workflow run.
///
/// Grows monotonically; values are stored in full. Only previews are ever
/// truncated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowContext {
    values: BTreeMap<String, String>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Word-boundary preview of the value stored under `key`.
    pub fn preview(&self, key: &str, max_chars: usize) -> Option<String> {
        self.get(key).map(|v| truncate_preview(v, max_chars))
    }

    /// Render every entry as a prompt block, each value cut to `max_chars`.
    ///
    /// Returns an empty string for an empty context.
    pub fn render_preview(&self, max_chars: usize) -> String {
        if self.values.is_empty() {
            return String::new();
        }
        let mut out = String::from("\n\nContext from previous agents:\n");
        for (key, value) in &self.values {
            out.push_str(&format!("{key}: {}...\n", truncate_preview(value, max_chars)));
        }
        out
    }
}

/// Cut `text` to at most `max_chars` characters, backing off to the last
/// space when the cut lands mid-word.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(idx) if idx > 0 => cut[..idx].to_string(),
        _ => cut,
    }
}

/// What `run_workflow` returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// One entry per original plan step, in production order.
    pub steps: Vec<StepResult>,
    /// The context as it stood when the last group finished.
    pub context: WorkflowContext,
}

/// What `plan_and_run` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAndRunReport {
    /// The plan that was executed (after plan-wide consolidation).
    pub plan: Plan,
    pub steps: Vec<StepResult>,
    pub context: WorkflowContext,
}
