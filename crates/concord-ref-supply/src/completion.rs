//! The orchestration completion notice.
//!
//! After a `plan_and_run` the reference runtime announces a summary on
//! [`ORCHESTRATION_COMPLETED_TOPIC`]. The topic sits outside the reserved
//! `agents.` namespace, so no performative is needed. The summary travels
//! next to an embedded orchestrator message, which carries the auth token
//! on guarded buses.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use concord_bus::MessageBus;
use concord_contracts::{
    error::ConcordResult,
    message::{AgentEvent, AgentMessage, AUTH_TOKEN_METADATA_KEY},
    workflow::PlanAndRunReport,
};

const ORCHESTRATOR_SENDER: &str = "Orchestrator";

pub const ORCHESTRATION_COMPLETED_TOPIC: &str = "agent.orchestration.completed";

/// The summary payload published after a run.
pub fn completion_payload(task: &str, report: &PlanAndRunReport) -> Map<String, Value> {
    let mut agents: Vec<&str> = Vec::new();
    for step in &report.steps {
        if !agents.contains(&step.agent.as_str()) {
            agents.push(step.agent.as_str());
        }
    }
    let context_keys: Vec<&str> = report.context.iter().map(|(k, _)| k).collect();

    let mut payload = Map::new();
    payload.insert("task".to_string(), json!(task));
    payload.insert("steps".to_string(), json!(report.steps.len()));
    payload.insert(
        "failed_steps".to_string(),
        json!(report.steps.iter().filter(|s| s.is_error()).count()),
    );
    payload.insert("agents".to_string(), json!(agents));
    payload.insert("context_keys".to_string(), json!(context_keys));
    payload
}

/// Publish the completion notice for `report` on `bus`.
///
/// `auth_token` goes into the embedded message's metadata. A rejected
/// publish is logged and returned; the run itself has already finished.
pub fn publish_completion(
    bus: &MessageBus,
    auth_token: Option<&str>,
    task: &str,
    report: &PlanAndRunReport,
) -> ConcordResult<()> {
    let mut metadata = Map::new();
    if let Some(token) = auth_token {
        metadata.insert(AUTH_TOKEN_METADATA_KEY.to_string(), json!(token));
    }
    let message = AgentMessage::new(ORCHESTRATOR_SENDER, task)
        .on_topic(ORCHESTRATION_COMPLETED_TOPIC)
        .with_metadata(metadata);

    let mut event = AgentEvent::from_message(ORCHESTRATION_COMPLETED_TOPIC, &message)?;
    event.payload.extend(completion_payload(task, report));
    match bus.publish(event) {
        Ok(()) => {
            info!(steps = report.steps.len(), "orchestration completion published");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "could not publish orchestration completion");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use concord_contracts::{
        error::ConcordError,
        plan::{Plan, PlanStep},
        workflow::{ExecutionOutcome, StepResult, WorkflowContext},
    };
    use concord_policy::{register_policy_with_token, PolicyConfig};

    use super::*;

    fn report() -> PlanAndRunReport {
        let mut context = WorkflowContext::new();
        context.insert("top_product", "Hex-Bolt-M8");
        PlanAndRunReport {
            plan: Plan::new(vec![
                PlanStep::new("Identify the top-selling product.", "top_product"),
                PlanStep::new("Build slides for {top_product}.", "deck"),
            ]),
            steps: vec![
                StepResult {
                    agent: "Sales Agent".to_string(),
                    task: "Identify the top-selling product.".to_string(),
                    output_key: Some("top_product".to_string()),
                    result: ExecutionOutcome::answered("Hex-Bolt-M8"),
                },
                StepResult {
                    agent: "Report Agent".to_string(),
                    task: "Build slides for Hex-Bolt-M8.".to_string(),
                    output_key: Some("deck".to_string()),
                    result: ExecutionOutcome::failed("renderer offline"),
                },
            ],
            context,
        }
    }

    #[test]
    fn payload_summarizes_the_run() {
        let payload = completion_payload("Make a deck", &report());
        assert_eq!(payload["task"], "Make a deck");
        assert_eq!(payload["steps"], 2);
        assert_eq!(payload["failed_steps"], 1);
        assert_eq!(payload["agents"], json!(["Sales Agent", "Report Agent"]));
        assert_eq!(payload["context_keys"], json!(["top_product"]));
    }

    #[test]
    fn completion_reaches_subscribers() {
        let bus = MessageBus::default();
        let seen: Arc<Mutex<Vec<AgentEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(ORCHESTRATION_COMPLETED_TOPIC, move |event: &AgentEvent| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

        publish_completion(&bus, None, "Make a deck", &report()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload["steps"], 2);
        assert_eq!(seen[0].message().unwrap().sender, "Orchestrator");
    }

    #[test]
    fn completion_passes_an_auth_guarded_bus() {
        let bus = MessageBus::default();
        register_policy_with_token(&bus, &PolicyConfig::default(), Some("s3cret".to_string()));
        let seen: Arc<Mutex<Vec<AgentEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(ORCHESTRATION_COMPLETED_TOPIC, move |event: &AgentEvent| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

        publish_completion(&bus, Some("s3cret"), "Make a deck", &report()).unwrap();
        let err = publish_completion(&bus, None, "Make a deck", &report()).unwrap_err();

        assert!(matches!(err, ConcordError::Unauthorized { .. }));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload["failed_steps"], 1);
    }
}
