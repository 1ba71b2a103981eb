//! Scenario 3: Coordinated Agents on a Policy-Guarded Bus
//!
//! A coordinator and two workers exchange FIPA-tagged messages over a
//! message bus running the default validator chain (auth, protocol, payload
//! size), configured from the embedded `bus.toml`.
//!
//! Sub-cases:
//!   3a. Four tasks are handed to the workers round-robin and answered
//!   3b. An intruder with the wrong secret is rejected (Unauthorized)
//!   3c. A reserved-topic message without a performative is rejected
//!       (ProtocolViolation)
//!   3d. A failing handler sends its event to the dead-letter sink
//!   3e. Stopping a worker removes its subscription

use std::sync::Arc;

use tracing::info;

use concord_bus::{AgentRuntime, BusAgent, BusConfig, MessageBus, MessageSender};
use concord_contracts::{
    error::{ConcordError, ConcordResult},
    message::{AgentEvent, Performative},
};
use concord_policy::{register_policy_with_token, PolicyConfig};

use crate::agents::{CoordinatorAgent, WorkerAgent, COORDINATOR_TASK_TOPIC, WORKER_REQUEST_TOPIC};

// ── Policy TOML ───────────────────────────────────────────────────────────────

const BUS_POLICY: &str = include_str!("../../policies/bus.toml");

/// Shared secret for the demo bus. Real deployments read it from the
/// environment variable named in `bus.toml`.
pub const DEMO_TOKEN: &str = "concord-demo-secret";

const AUDIT_TOPIC: &str = "supply.audit";

pub const WORKER_NAMES: [&str; 2] = ["KPI Worker", "Summary Worker"];

const TASKS: [&str; 4] = [
    "Compute fill rate for Widget-X",
    "Summarize open purchase orders",
    "Compute days of supply for Hex-Bolt-M8",
    "Summarize stock-outs this quarter",
];

/// A bus with the default policy chain and the given auth secret.
pub fn guarded_bus(token: Option<String>) -> ConcordResult<Arc<MessageBus>> {
    let bus_config = BusConfig::from_toml_str(BUS_POLICY)?;
    let policy = PolicyConfig::from_toml_str(BUS_POLICY)?;
    let bus = Arc::new(MessageBus::new(bus_config));
    register_policy_with_token(&bus, &policy, token);
    Ok(bus)
}

fn outcome_label(result: &ConcordResult<()>) -> String {
    match result {
        Ok(()) => "ACCEPTED".to_string(),
        Err(e) => format!("REJECTED ({e})"),
    }
}

/// Run Scenario 3: Coordinated Agents on a Policy-Guarded Bus.
pub fn run_scenario() -> ConcordResult<()> {
    println!("=== Scenario 3: Coordinated Agents on a Policy-Guarded Bus ===");
    println!();

    let bus = guarded_bus(Some(DEMO_TOKEN.to_string()))?;
    println!(
        "  Bus: max dispatch depth {}, dead-letter capacity {}",
        bus.config().max_dispatch_depth,
        bus.config().dead_letter_capacity
    );
    println!("  Policy: auth → protocol → payload size");
    println!();

    // ── Start the agents ──────────────────────────────────────────────────────

    let coordinator = Arc::new(CoordinatorAgent::new(
        WORKER_NAMES.iter().map(|w| w.to_string()).collect(),
    ));
    let workers: Vec<Arc<WorkerAgent>> = WORKER_NAMES.iter().map(|w| Arc::new(WorkerAgent::new(*w))).collect();

    let coordinator_rt = AgentRuntime::new(coordinator.clone(), &bus, Some(DEMO_TOKEN.to_string()));
    coordinator_rt.start()?;
    let worker_rts: Vec<AgentRuntime> = workers
        .iter()
        .map(|w| AgentRuntime::new(w.clone(), &bus, Some(DEMO_TOKEN.to_string())))
        .collect();
    for rt in &worker_rts {
        rt.start()?;
    }

    // ── 3a: Round-robin assignment ────────────────────────────────────────────

    println!("  3a. Assigning {} tasks", TASKS.len());
    let planner = MessageSender::new("Planner", &bus, Some(DEMO_TOKEN.to_string()));
    for (i, task) in TASKS.iter().enumerate() {
        planner.send(
            vec![coordinator_rt.identity().name.clone()],
            COORDINATOR_TASK_TOPIC,
            task,
            Some(Performative::Request),
            Some(format!("task-{}", i + 1)),
            None,
        )?;
    }
    for response in coordinator.responses() {
        println!(
            "      [{}] {}: {}",
            response.conversation_id().unwrap_or("-"),
            response.sender,
            response.content
        );
    }
    for worker in &workers {
        println!("      {} handled {} request(s)", worker.identity().name, worker.handled());
    }
    println!();

    // ── 3b: Wrong secret ──────────────────────────────────────────────────────

    let intruder = MessageSender::new("Intruder", &bus, Some("guessed-secret".to_string()));
    let result = intruder.send(
        vec![WORKER_NAMES[0].to_string()],
        WORKER_REQUEST_TOPIC,
        "Export the supplier price list",
        Some(Performative::Request),
        None,
        None,
    );
    println!("  3b. Intruder with wrong secret: {}", outcome_label(&result));
    if !matches!(result, Err(ConcordError::Unauthorized { .. })) {
        return Err(ConcordError::handler("intruder message was not rejected as unauthorized"));
    }

    // ── 3c: Missing performative ──────────────────────────────────────────────

    let result = planner.send(
        vec![coordinator_rt.identity().name.clone()],
        COORDINATOR_TASK_TOPIC,
        "Untagged task",
        None,
        None,
        None,
    );
    println!("  3c. Reserved topic without performative: {}", outcome_label(&result));
    if !matches!(result, Err(ConcordError::ProtocolViolation { .. })) {
        return Err(ConcordError::handler("untagged agent message was not rejected"));
    }

    // ── 3d: Failing handler ───────────────────────────────────────────────────

    bus.subscribe(AUDIT_TOPIC, |event: &AgentEvent| {
        Err(ConcordError::handler(format!("audit store offline, dropping event {}", event.id)))
    });
    planner.send(vec![], AUDIT_TOPIC, "Weekly stock audit", None, None, None)?;
    let dead = bus.dead_letters();
    println!("  3d. Failing handler: {} dead letter(s)", dead.len());
    for letter in &dead {
        println!("      {} → {}", letter.failed_topic, letter.reason);
    }

    // ── 3e: Stop ──────────────────────────────────────────────────────────────

    let before = bus.subscriber_count(WORKER_REQUEST_TOPIC);
    for rt in &worker_rts {
        rt.stop();
    }
    coordinator_rt.stop();
    println!(
        "  3e. Stopped agents: {} → {} worker subscription(s)",
        before,
        bus.subscriber_count(WORKER_REQUEST_TOPIC)
    );
    println!();

    info!(
        responses = coordinator.responses().len(),
        dead_letters = dead.len(),
        "bus coordination scenario finished"
    );
    println!("  Result: COMPLETE");
    println!();
    Ok(())
}
