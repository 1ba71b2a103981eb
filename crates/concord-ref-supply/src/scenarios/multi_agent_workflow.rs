//! Scenario 2: Multi-Agent Supplier Lookup
//!
//! A two-step plan spanning two agents, where the second step consumes the
//! first step's answer through a `{top_product}` placeholder.
//!
//! Pipeline:
//!   Sales Agent (top_product) → Supplier Agent (supplier_info)
//!
//! When the run finishes, a summary is published on the message bus under
//! `agent.orchestration.completed`, where a listener picks it up.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use concord_bus::MessageBus;
use concord_contracts::{error::ConcordResult, message::AgentEvent};

use crate::{
    collaborators::supply_orchestrator,
    completion::{publish_completion, ORCHESTRATION_COMPLETED_TOPIC},
};

pub const SUPPLIER_TASK: &str = "For the top-selling product, find its supplier and lead time.";

/// Run Scenario 2: Multi-Agent Supplier Lookup.
pub fn run_scenario() -> ConcordResult<()> {
    println!("=== Scenario 2: Multi-Agent Supplier Lookup ===");
    println!();
    println!("  Task: {SUPPLIER_TASK}");
    println!("  Pipeline: Sales Agent → Supplier Agent");
    println!();

    let (orchestrator, _calls) = supply_orchestrator()?;

    // ── Completion listener ───────────────────────────────────────────────────

    let bus = MessageBus::default();
    let notices: Arc<Mutex<Vec<AgentEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    bus.subscribe(ORCHESTRATION_COMPLETED_TOPIC, move |event: &AgentEvent| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    });

    // ── Plan and run ──────────────────────────────────────────────────────────

    let report = orchestrator.plan_and_run(SUPPLIER_TASK, None)?;

    for (i, step) in report.steps.iter().enumerate() {
        println!("  Step {}: {}", i + 1, step.agent);
        println!("    Task:   {}", step.task);
        match step.result.usable_answer() {
            Some(answer) => println!("    Answer: {answer}"),
            None => println!("    Error:  {}", step.result.error.as_deref().unwrap_or("no answer")),
        }
    }
    println!();

    publish_completion(&bus, None, SUPPLIER_TASK, &report)?;

    let notices = notices.lock().unwrap_or_else(PoisonError::into_inner);
    for notice in notices.iter() {
        println!(
            "  Completion notice: {} step(s), {} failed, agents {}",
            notice.payload["steps"], notice.payload["failed_steps"], notice.payload["agents"]
        );
    }
    println!();

    info!(steps = report.steps.len(), notices = notices.len(), "multi-agent scenario finished");
    println!("  Result: COMPLETE");
    println!();
    Ok(())
}
