//! Concord Supply-Chain Reference Runtime: Demo CLI
//!
//! Runs one or all of the three supply-chain demo scenarios, or plans and
//! runs an arbitrary task against the mock collaborators. Each scenario uses
//! real Concord components (planner, router, orchestrator, message bus,
//! validator chain) wired together with mock supply-chain data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- consolidated-planning
//!   cargo run -p demo -- multi-agent
//!   cargo run -p demo -- bus-coordination
//!   cargo run -p demo -- plan "Which materials are slow moving?"

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use concord_contracts::{error::ConcordResult, plan::PlanOutcome};
use concord_ref_supply::{
    collaborators::supply_orchestrator,
    scenarios::{bus_coordination, consolidated_planning, multi_agent_workflow},
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Concord multi-agent orchestration supply-chain demo.
///
/// Each subcommand runs one or all of the supply-chain scenarios,
/// demonstrating planning, routing, consolidation, and policy-guarded agent
/// messaging.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Concord supply-chain reference runtime demo",
    long_about = "Runs Concord supply-chain demo scenarios showing task planning,\n\
                  agent routing, step consolidation, and policy-guarded agent messaging."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three supply-chain scenarios in sequence.
    RunAll,
    /// Scenario 1: Consolidated Inventory Planning (one agent, one execution).
    ConsolidatedPlanning,
    /// Scenario 2: Multi-Agent Supplier Lookup (placeholder substitution).
    MultiAgent,
    /// Scenario 3: Coordinated Agents on a Policy-Guarded Bus.
    BusCoordination,
    /// Plan and run a free-form task against the mock collaborators.
    Plan {
        /// The task to plan, e.g. "Check inventory turnover".
        task: String,
        /// Restrict routing to these agent names (repeatable).
        #[arg(long = "agent")]
        agents: Vec<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::ConsolidatedPlanning => consolidated_planning::run_scenario(),
        Command::MultiAgent => multi_agent_workflow::run_scenario(),
        Command::BusCoordination => bus_coordination::run_scenario(),
        Command::Plan { task, agents } => run_plan(&task, &agents),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> ConcordResult<()> {
    consolidated_planning::run_scenario()?;
    multi_agent_workflow::run_scenario()?;
    bus_coordination::run_scenario()?;
    Ok(())
}

fn run_plan(task: &str, agents: &[String]) -> ConcordResult<()> {
    println!("=== Ad-hoc Task ===");
    println!();
    println!("  Task: {task}");
    println!();

    let (orchestrator, _calls) = supply_orchestrator()?;
    let candidates = (!agents.is_empty()).then_some(agents);

    let plan = match orchestrator.plan(task) {
        PlanOutcome::Planned(plan) => plan,
        PlanOutcome::Fallback { plan, reason } => {
            println!("  Planner fell back to a single step: {reason}");
            plan
        }
    };
    let plan = orchestrator.consolidate_plan_if_needed(plan, candidates);
    println!("  Executing {} step(s)", plan.len());
    println!();

    let report = orchestrator.run_workflow(&plan, candidates)?;
    info!(steps = report.steps.len(), "ad-hoc task finished");

    for (i, step) in report.steps.iter().enumerate() {
        println!("  Step {}: {}", i + 1, step.agent);
        println!("    Task:   {}", step.task);
        match step.result.usable_answer() {
            Some(answer) => println!("    Answer: {answer}"),
            None => println!("    Error:  {}", step.result.error.as_deref().unwrap_or("no answer")),
        }
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Concord — Multi-Agent Orchestration Core");
    println!("Supply-Chain Reference Demo");
    println!("========================================");
    println!();
    println!("Orchestration pipeline per task:");
    println!("  [1] Planner turns the task into ordered steps (fallback: the task itself)");
    println!("  [2] Router picks one agent per step from the discovered candidates");
    println!("  [3] Plans bound for a single agent collapse into one comprehensive step");
    println!("  [4] Steps run group by group, answers feed later {{placeholders}}");
    println!("  [5] Agents talk over a validated bus: auth → protocol → payload size");
    println!();
}
