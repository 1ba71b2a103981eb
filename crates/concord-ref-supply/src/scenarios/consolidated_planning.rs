//! Scenario 1: Consolidated Inventory Planning
//!
//! A two-step inventory plan whose steps both route to the Inventory Agent.
//! The orchestrator collapses the plan into one comprehensive step before
//! execution, so the agent is invoked exactly once and the answer lands in
//! the context under `consolidated_analysis`.
//!
//! Walk-through:
//!   1. Planner turns the task into two inventory steps
//!   2. Router sends both to Inventory Agent → plan collapses to one step
//!   3. Executor runs the merged request once
//!   4. Context holds the turnover analysis

use tracing::info;

use concord_contracts::error::{ConcordError, ConcordResult};
use concord_core::consolidator::CONSOLIDATED_OUTPUT_KEY;

use crate::collaborators::supply_orchestrator;

pub const TURNOVER_TASK: &str = "Analyze inventory turnover and list fast and slow moving materials.";

/// Run Scenario 1: Consolidated Inventory Planning.
pub fn run_scenario() -> ConcordResult<()> {
    println!("=== Scenario 1: Consolidated Inventory Planning ===");
    println!();
    println!("  Task: {TURNOVER_TASK}");
    println!();

    let (orchestrator, calls_log) = supply_orchestrator()?;

    // ── Plan ──────────────────────────────────────────────────────────────────

    let plan = orchestrator.plan_from_task(TURNOVER_TASK);
    println!("  Planner proposed {} step(s):", plan.len());
    for (i, step) in plan.iter().enumerate() {
        println!("    {}. {}", i + 1, step.task);
    }
    println!();

    // ── Consolidate ───────────────────────────────────────────────────────────

    let plan = orchestrator.consolidate_plan_if_needed(plan, None);
    if plan.len() == 1 {
        println!("  All steps route to one agent → plan consolidated to 1 step");
    } else {
        println!("  Steps span {} agents → plan kept as is", plan.len());
    }
    println!();

    // ── Execute ───────────────────────────────────────────────────────────────

    let report = orchestrator.run_workflow(&plan, None)?;
    for step in &report.steps {
        println!("  Agent:  {}", step.agent);
        match step.result.usable_answer() {
            Some(answer) => {
                println!("  Answer:");
                for line in answer.lines() {
                    println!("    {line}");
                }
            }
            None => println!("  Error:  {}", step.result.error.as_deref().unwrap_or("no answer")),
        }
    }
    println!();

    let executions = calls_log
        .executor_calls
        .lock()
        .map_err(|_| ConcordError::Execution {
            reason: "executor call log poisoned".to_string(),
        })?
        .len();
    println!("  Executor invocations: {executions}");
    println!(
        "  Context keys: {}",
        report.context.iter().map(|(k, _)| k).collect::<Vec<_>>().join(", ")
    );
    println!();

    info!(
        executions,
        consolidated = report.context.contains_key(CONSOLIDATED_OUTPUT_KEY),
        "consolidated planning scenario finished"
    );
    println!("  Result: COMPLETE");
    println!();
    Ok(())
}
