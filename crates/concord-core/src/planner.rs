//! Task planner: free-text task → ordered plan.
//!
//! The planner asks the reasoning service for a strict JSON array of
//! `{task, output_key}` objects and hands the raw text to a `PlanDecoder`.
//! Planning is total: every failure path yields `PlanOutcome::Fallback`
//! carrying the single-step default plan.

use std::sync::Arc;

use tracing::{debug, info, warn};

use concord_contracts::plan::{Plan, PlanOutcome, PlanningFailure};

use crate::traits::{PlanDecoder, ReasoningService};

/// Builds plans via a reasoning service with a deterministic fallback.
pub struct TaskPlanner {
    reasoning: Arc<dyn ReasoningService>,
    decoder: Box<dyn PlanDecoder>,
    temperature: f32,
}

impl TaskPlanner {
    pub fn new(reasoning: Arc<dyn ReasoningService>, decoder: Box<dyn PlanDecoder>) -> Self {
        Self {
            reasoning,
            decoder,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The planning prompt for `task`.
    pub fn build_prompt(task: &str) -> String {
        format!(
            "You are an intelligent assistant that creates a JSON plan to solve a user's task. \
             Break the main task into 2-4 sequential steps, BUT if all steps would likely be handled \
             by the same type of agent, create a single comprehensive task instead.\n\n\
             RULES:\n\
             - Return a valid JSON array of objects. Do not add comments or any other text.\n\
             - Each object must have a 'task' and an 'output_key'.\n\
             - The 'task' for a later step MUST use the 'output_key' from a previous step as a \
             placeholder in curly braces if it needs that data. For example: 'Analyze the sales data for {{product_name}}'.\n\
             - The first task should address the first logical part of the original user's question.\n\
             - Ensure 'output_key' is a simple, valid variable name (e.g., 'understocked_materials', 'sales_summary').\n\
             - IMPORTANT: If all steps would be handled by the same agent type (e.g., all inventory analysis, \
             all turnover analysis), consolidate them into ONE comprehensive task.\n\n\
             EXAMPLE (Multiple Agents):\n\
             User Task: 'For the top-selling product, find its supplier.'\n\
             JSON Plan: [\n  {{\"task\": \"Identify the top-selling product.\", \"output_key\": \"top_product\"}},\n  \
             {{\"task\": \"Find the supplier for {{top_product}}.\", \"output_key\": \"supplier_info\"}}\n]\n\n\
             EXAMPLE (Same Agent - Consolidate):\n\
             User Task: 'Check inventory and turnover rate. Find which Materials are selling fast and which are slow'\n\
             Consolidated JSON Plan: [{{\"task\": \"Perform comprehensive inventory turnover analysis including \
             checking current inventory levels, calculating turnover rates for all materials, and identifying \
             both fast-selling and slow-selling materials with detailed insights and recommendations.\", \
             \"output_key\": \"turnover_analysis\"}}]\n\n\
             Now, generate the plan for this task:\n\
             Task: {task}"
        )
    }

    /// Plan `task`, reporting whether the fallback was taken and why.
    pub fn plan(&self, task: &str) -> PlanOutcome {
        if task.trim().is_empty() {
            return self.fallback(task, PlanningFailure::EmptyTask);
        }

        let prompt = Self::build_prompt(task);
        let raw = match self.reasoning.complete(&prompt, self.temperature) {
            Ok(raw) => raw,
            Err(e) => return self.fallback(task, PlanningFailure::Reasoning(e.to_string())),
        };

        let raw = raw.trim();
        debug!(response = %raw, "raw plan response");
        if raw.is_empty() {
            return self.fallback(task, PlanningFailure::EmptyResponse);
        }

        match self.decoder.decode(raw) {
            Ok(plan) => {
                info!(steps = plan.len(), "parsed plan from reasoning service");
                PlanOutcome::Planned(plan)
            }
            Err(reason) => self.fallback(task, reason),
        }
    }

    /// Plan `task`, discarding the fallback reason. Never fails.
    pub fn plan_from_task(&self, task: &str) -> Plan {
        self.plan(task).into_plan()
    }

    fn fallback(&self, task: &str, reason: PlanningFailure) -> PlanOutcome {
        warn!(task = %task, reason = %reason, "planning failed, using single-step default plan");
        PlanOutcome::Fallback {
            plan: Plan::fallback(task),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use concord_contracts::{
        error::{ConcordError, ConcordResult},
        plan::{Plan, PlanOutcome, PlanStep, PlanningFailure},
    };

    use crate::traits::{PlanDecoder, ReasoningService};

    use super::TaskPlanner;

    /// Returns a canned response and remembers every prompt.
    struct CannedReasoning {
        response: ConcordResult<String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl CannedReasoning {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                prompts: Arc::new(Mutex::new(vec![])),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(ConcordError::Reasoning {
                    reason: "rate limited".to_string(),
                }),
                prompts: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl ReasoningService for CannedReasoning {
        fn complete(&self, prompt: &str, _temperature: f32) -> ConcordResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(ConcordError::Reasoning { reason: e.to_string() }),
            }
        }
    }

    /// Plain serde decoding: a list of step objects or bust.
    struct SerdeDecoder;

    impl PlanDecoder for SerdeDecoder {
        fn decode(&self, raw: &str) -> Result<Plan, PlanningFailure> {
            let value: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| PlanningFailure::Malformed(e.to_string()))?;
            serde_json::from_value(value).map_err(|e| PlanningFailure::InvalidShape(e.to_string()))
        }
    }

    fn planner(reasoning: CannedReasoning) -> TaskPlanner {
        TaskPlanner::new(Arc::new(reasoning), Box::new(SerdeDecoder))
    }

    #[test]
    fn decodes_a_valid_plan() {
        let p = planner(CannedReasoning::ok(
            r#"[{"task": "Identify the top-selling product.", "output_key": "top_product"},
                {"task": "Find the supplier for {top_product}.", "output_key": "supplier_info"}]"#,
        ));
        let outcome = p.plan("For the top-selling product, find its supplier.");
        match outcome {
            PlanOutcome::Planned(plan) => {
                assert_eq!(plan.len(), 2);
                assert_eq!(plan.steps()[1], PlanStep::new("Find the supplier for {top_product}.", "supplier_info"));
            }
            other => panic!("expected Planned, got {:?}", other),
        }
    }

    #[test]
    fn empty_task_falls_back_without_calling_the_service() {
        let reasoning = CannedReasoning::ok("[]");
        let prompts = reasoning.prompts.clone();
        let p = planner(reasoning);

        let outcome = p.plan("");
        assert_eq!(
            outcome,
            PlanOutcome::Fallback {
                plan: Plan::new(vec![PlanStep::new("", "answer")]),
                reason: PlanningFailure::EmptyTask,
            }
        );
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn service_error_falls_back() {
        let p = planner(CannedReasoning::failing());
        let plan = p.plan_from_task("  Check stock  ");
        assert_eq!(plan, Plan::fallback("Check stock"));
    }

    #[test]
    fn blank_response_falls_back() {
        let p = planner(CannedReasoning::ok("   \n"));
        match p.plan("Check stock") {
            PlanOutcome::Fallback { reason, .. } => assert_eq!(reason, PlanningFailure::EmptyResponse),
            other => panic!("expected Fallback, got {:?}", other),
        }
    }

    #[test]
    fn non_json_falls_back() {
        let p = planner(CannedReasoning::ok("Step 1: check stock"));
        match p.plan("Check stock") {
            PlanOutcome::Fallback { reason, plan } => {
                assert!(matches!(reason, PlanningFailure::Malformed(_)));
                assert_eq!(plan, Plan::fallback("Check stock"));
            }
            other => panic!("expected Fallback, got {:?}", other),
        }
    }

    #[test]
    fn wrong_shape_falls_back() {
        let p = planner(CannedReasoning::ok(r#"{"task": "not a list"}"#));
        assert!(p.plan("Check stock").is_fallback());

        let p = planner(CannedReasoning::ok(r#"["just a string"]"#));
        assert!(p.plan("Check stock").is_fallback());
    }

    #[test]
    fn prompt_embeds_task_and_placeholder_example() {
        let prompt = TaskPlanner::build_prompt("Check turnover");
        assert!(prompt.ends_with("Task: Check turnover"));
        assert!(prompt.contains("{top_product}"));
        assert!(prompt.contains("2-4 sequential steps"));
    }
}
