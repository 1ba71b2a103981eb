//! Mock collaborators backing the reference runtime.
//!
//! `ScriptedReasoning` answers planning and routing prompts by keyword, the
//! way a well-behaved model would for the supply-chain demo tasks.
//! `StaticDirectory` and `MockInventoryExecutor` serve the data in
//! [`crate::mock_data`].

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use concord_contracts::{
    agent::AgentDescriptor,
    error::{ConcordError, ConcordResult},
    workflow::ExecutionOutcome,
};
use concord_core::{
    traits::{AgentDirectory, ReasoningService, TaskExecutor},
    Orchestrator, WorkflowConfig,
};
use concord_verify::SchemaPlanDecoder;

use crate::mock_data::{
    find_material_in, materials, supply_agents, top_selling_product, turnover_report,
    INVENTORY_AGENT, REPORT_AGENT, SALES_AGENT, SUPPLIER_AGENT,
};

/// Embedded orchestrator settings for the reference runtime.
const WORKFLOW_CONFIG: &str = include_str!("../policies/workflow.toml");

// ── Reasoning ─────────────────────────────────────────────────────────────────

const ROUTING_KEYWORDS: &[(&str, &str)] = &[
    ("top-selling", SALES_AGENT),
    ("best-selling", SALES_AGENT),
    ("supplier", SUPPLIER_AGENT),
    ("lead time", SUPPLIER_AGENT),
    ("slide", REPORT_AGENT),
    ("presentation", REPORT_AGENT),
    ("inventory", INVENTORY_AGENT),
    ("turnover", INVENTORY_AGENT),
    ("stock", INVENTORY_AGENT),
];

const SUPPLIER_PLAN: &str = "```json
[
  {\"task\": \"Identify the top-selling product.\", \"output_key\": \"top_product\"},
  {\"task\": \"Find the supplier and lead time for {top_product}.\", \"output_key\": \"supplier_info\"}
]
```";

const TURNOVER_PLAN: &str = r#"[
  {"task": "Check current inventory levels for all materials.", "output_key": "inventory_levels"},
  {"task": "Calculate turnover rates and identify fast and slow moving materials.", "output_key": "turnover_rates"}
]"#;

/// Keyword-scripted stand-in for an LLM.
#[derive(Default)]
pub struct ScriptedReasoning {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle on every prompt received.
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }

    fn plan_for(task: &str) -> String {
        let task = task.to_lowercase();
        if task.contains("supplier") && (task.contains("top-selling") || task.contains("top selling")) {
            SUPPLIER_PLAN.to_string()
        } else if task.contains("inventory") || task.contains("turnover") {
            TURNOVER_PLAN.to_string()
        } else {
            "I'm sorry, I can't break that task into steps.".to_string()
        }
    }

    fn route_for(task: &str) -> String {
        let task = task.to_lowercase();
        match ROUTING_KEYWORDS.iter().find(|(kw, _)| task.contains(kw)) {
            Some((_, agent)) => format!("\"{agent}\""),
            None => "I'm not sure which agent fits.".to_string(),
        }
    }
}

/// The text after the last `marker` in `prompt`, up to `end` if present.
fn extract<'p>(prompt: &'p str, marker: &str, end: &str) -> &'p str {
    let start = prompt.rfind(marker).map_or(0, |i| i + marker.len());
    let rest = &prompt[start..];
    rest.find(end).map_or(rest, |i| &rest[..i])
}

impl ReasoningService for ScriptedReasoning {
    fn complete(&self, prompt: &str, _temperature: f32) -> ConcordResult<String> {
        self.prompts
            .lock()
            .map_err(|_| ConcordError::Reasoning {
                reason: "prompt log poisoned".to_string(),
            })?
            .push(prompt.to_string());

        if prompt.contains("routing assistant") {
            let task = extract(prompt, "Task: \"", "\"\n\nRespond");
            return Ok(Self::route_for(task));
        }
        let task = extract(prompt, "Task: ", "\n");
        Ok(Self::plan_for(task))
    }
}

// ── Directory ─────────────────────────────────────────────────────────────────

/// A fixed agent roster that counts how often it is asked.
pub struct StaticDirectory {
    agents: Vec<AgentDescriptor>,
    calls: Arc<Mutex<u32>>,
}

impl StaticDirectory {
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self {
            agents,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<u32>> {
        self.calls.clone()
    }
}

impl AgentDirectory for StaticDirectory {
    fn list_agents(&self) -> ConcordResult<Vec<AgentDescriptor>> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        Ok(self.agents.clone())
    }
}

// ── Executor ──────────────────────────────────────────────────────────────────

/// One recorded `execute` call: task text and target agent.
pub type ExecuteCall = (String, Option<String>);

/// Answers tasks from the mock supply-chain tables.
#[derive(Default)]
pub struct MockInventoryExecutor {
    calls: Arc<Mutex<Vec<ExecuteCall>>>,
}

impl MockInventoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<ExecuteCall>>> {
        self.calls.clone()
    }
}

impl TaskExecutor for MockInventoryExecutor {
    fn execute(&self, task: &str, agent_name: Option<&str>) -> ConcordResult<ExecutionOutcome> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((task.to_string(), agent_name.map(str::to_string)));
        }
        debug!(agent = ?agent_name, "mock executor invoked");

        match agent_name {
            Some(INVENTORY_AGENT) => Ok(ExecutionOutcome::answered(turnover_report())
                .with_extra("sql", json!("SELECT code, name, on_hand, monthly_usage FROM materials"))
                .with_extra("rows", json!(materials().len()))),

            Some(SALES_AGENT) => match top_selling_product() {
                Some(m) => Ok(ExecutionOutcome::answered(m.name)
                    .with_extra("sql", json!("SELECT name FROM materials ORDER BY units_sold_ytd DESC LIMIT 1"))
                    .with_extra("units_sold_ytd", json!(m.units_sold_ytd))),
                None => Ok(ExecutionOutcome::failed("No sales data available")),
            },

            Some(SUPPLIER_AGENT) => match find_material_in(task) {
                Some(m) => Ok(ExecutionOutcome::answered(format!(
                    "{} is supplied by {} with a {}-day lead time",
                    m.name, m.supplier, m.lead_time_days
                ))),
                None => Ok(ExecutionOutcome::failed("No known material named in the request")),
            },

            Some(REPORT_AGENT) => Err(ConcordError::Execution {
                reason: "document rendering is not available in the reference runtime".to_string(),
            }),

            other => Err(ConcordError::Execution {
                reason: format!("no executor registered for agent {:?}", other),
            }),
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Inspectable handles on the collaborators inside a supply orchestrator.
pub struct SupplyCallLog {
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub directory_calls: Arc<Mutex<u32>>,
    pub executor_calls: Arc<Mutex<Vec<ExecuteCall>>>,
}

/// An orchestrator over the mock supply-chain collaborators, configured
/// from the embedded `workflow.toml`.
pub fn supply_orchestrator() -> ConcordResult<(Orchestrator, SupplyCallLog)> {
    let config = WorkflowConfig::from_toml_str(WORKFLOW_CONFIG)?;
    let reasoning = ScriptedReasoning::new();
    let directory = StaticDirectory::new(supply_agents());
    let executor = MockInventoryExecutor::new();

    let calls_log = SupplyCallLog {
        prompts: reasoning.prompts(),
        directory_calls: directory.calls(),
        executor_calls: executor.calls(),
    };

    let orchestrator = Orchestrator::new(
        Arc::new(reasoning),
        Box::new(SchemaPlanDecoder::new()?),
        Box::new(directory),
        Box::new(executor),
        config,
    );
    Ok((orchestrator, calls_log))
}
