//! The Concord orchestrator: plan, consolidate, route, and execute.
//!
//! A workflow run follows a fixed order:
//!
//!   Discover → Route → Group → [Substitute → Execute → Record] per group
//!
//! Groups run strictly in sequence; a later group sees every answer written
//! by the groups before it. The only fatal condition is an empty candidate
//! set. Every other failure is captured in the step's result and the run
//! continues.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use concord_contracts::{
    agent::AgentDescriptor,
    error::{ConcordError, ConcordResult},
    plan::{Plan, PlanOutcome, PlanStep},
    workflow::{ExecutionOutcome, PlanAndRunReport, StepResult, WorkflowContext, WorkflowReport},
};

use crate::{
    config::WorkflowConfig,
    consolidator::{self, StepGroup},
    discovery::DiscoveryCache,
    planner::TaskPlanner,
    router::AgentRouter,
    template::{self, TemplateError},
    traits::{AcceptAll, AgentDirectory, PlanDecoder, ReasoningService, ResultEvaluator, TaskExecutor},
};

/// Owns the planner, router, discovery cache, and execution collaborator.
///
/// All caches live on the instance; two orchestrators never share state.
pub struct Orchestrator {
    planner: TaskPlanner,
    router: AgentRouter,
    discovery: DiscoveryCache,
    executor: Box<dyn TaskExecutor>,
    evaluator: Box<dyn ResultEvaluator>,
    config: WorkflowConfig,
}

impl Orchestrator {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        decoder: Box<dyn PlanDecoder>,
        directory: Box<dyn AgentDirectory>,
        executor: Box<dyn TaskExecutor>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            planner: TaskPlanner::new(reasoning.clone(), decoder).with_temperature(config.temperature),
            router: AgentRouter::new(reasoning).with_temperature(config.temperature),
            discovery: DiscoveryCache::new(directory, config.discovery_ttl()),
            executor,
            evaluator: Box::new(AcceptAll),
            config,
        }
    }

    /// Replace the refinement evaluator (default: accept everything).
    pub fn with_evaluator(mut self, evaluator: Box<dyn ResultEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ── Planning and routing ────────────────────────────────────────────────

    pub fn plan(&self, task: &str) -> PlanOutcome {
        self.planner.plan(task)
    }

    pub fn plan_from_task(&self, task: &str) -> Plan {
        self.planner.plan_from_task(task)
    }

    pub fn route<'a>(&self, task: &str, agents: &'a [AgentDescriptor]) -> Option<&'a AgentDescriptor> {
        self.router.route(task, agents)
    }

    // ── Discovery ───────────────────────────────────────────────────────────

    pub fn discover_all_agents(&self) -> Vec<AgentDescriptor> {
        self.discovery.all()
    }

    pub fn discover_agents(&self, names: &[String]) -> Vec<AgentDescriptor> {
        self.discovery.filtered(names)
    }

    pub fn invalidate_agent_cache(&self) {
        self.discovery.invalidate();
    }

    fn candidate_agents(&self, candidates: Option<&[String]>) -> Vec<AgentDescriptor> {
        match candidates {
            Some(names) if !names.is_empty() => self.discover_agents(names),
            _ => self.discover_all_agents(),
        }
    }

    // ── Plan-wide consolidation ─────────────────────────────────────────────

    /// Collapse `plan` to a single step when every step routes to the same
    /// agent. Plans of zero or one step, and runs with no candidates, pass
    /// through unchanged.
    pub fn consolidate_plan_if_needed(&self, plan: Plan, candidates: Option<&[String]>) -> Plan {
        if plan.len() <= 1 {
            return plan;
        }

        let agents = self.candidate_agents(candidates);
        if agents.is_empty() {
            warn!(steps = plan.len(), "no agents available, skipping plan consolidation");
            return plan;
        }

        let assigned: Vec<Option<&str>> = plan
            .iter()
            .map(|step| self.router.route(&step.task, &agents).map(|a| a.name.as_str()))
            .collect();

        let first = assigned[0];
        if first.is_some() && assigned.iter().all(|a| *a == first) {
            info!(
                steps = plan.len(),
                agent = first.unwrap_or_default(),
                "all steps route to one agent, consolidating plan"
            );
            consolidator::merge_plan(&plan)
        } else {
            debug!(steps = plan.len(), "plan spans several agents, keeping steps");
            plan
        }
    }

    // ── Workflow execution ──────────────────────────────────────────────────

    /// Execute `plan` against the discovered agents.
    ///
    /// # Errors
    ///
    /// Returns `ConcordError::NoAgentsAvailable` when discovery (after the
    /// optional `candidates` filter) yields nothing. No step runs in that
    /// case.
    pub fn run_workflow(
        &self,
        plan: &Plan,
        candidates: Option<&[String]>,
    ) -> ConcordResult<WorkflowReport> {
        let duplicates = plan.duplicate_output_keys();
        if !duplicates.is_empty() {
            warn!(keys = ?duplicates, "plan reuses output keys, later answers overwrite earlier ones");
        }

        let agents = self.candidate_agents(candidates);
        if agents.is_empty() {
            warn!(candidates = ?candidates, "no agents available for workflow");
            return Err(ConcordError::NoAgentsAvailable);
        }

        debug!(steps = plan.len(), agents = agents.len(), "workflow starting");

        // ── Step 1: Route every non-empty step ──────────────────────────────
        let mut skipped: Vec<&PlanStep> = Vec::new();
        let mut assignments: Vec<(usize, &PlanStep, &str)> = Vec::new();
        for (index, step) in plan.iter().enumerate() {
            if step.task.trim().is_empty() {
                warn!(step = index, "step has no task text, skipping");
                skipped.push(step);
                continue;
            }
            match self.router.route(&step.task, &agents) {
                Some(agent) => assignments.push((index, step, agent.name.as_str())),
                None => skipped.push(step),
            }
        }

        // ── Step 2: Group by agent, first appearance first ──────────────────
        let groups = consolidator::group_by_agent(assignments);
        info!(groups = groups.len(), "routed plan steps");

        // ── Step 3: Run each group in order ─────────────────────────────────
        let mut context = WorkflowContext::new();
        let mut results: Vec<StepResult> = Vec::with_capacity(plan.len());

        for group in &groups {
            let produced = self.run_group(group, &context);
            for result in produced {
                results.push(result);
                record_answer(&mut context, results.len(), &results[results.len() - 1]);
            }
        }

        for step in skipped {
            results.push(StepResult::unassigned(
                step.task.clone(),
                step.output_key.clone(),
                "Step has no task to execute",
            ));
        }

        info!(
            steps = results.len(),
            failed = results.iter().filter(|r| r.is_error()).count(),
            context_keys = context.len(),
            "workflow complete"
        );

        Ok(WorkflowReport {
            steps: results,
            context,
        })
    }

    /// Plan `task`, consolidate the plan if it targets one agent, and run it.
    pub fn plan_and_run(
        &self,
        task: &str,
        candidates: Option<&[String]>,
    ) -> ConcordResult<PlanAndRunReport> {
        let plan = self.plan_from_task(task);
        let plan = self.consolidate_plan_if_needed(plan, candidates);
        let report = self.run_workflow(&plan, candidates)?;
        Ok(PlanAndRunReport {
            plan,
            steps: report.steps,
            context: report.context,
        })
    }

    fn run_group(&self, group: &StepGroup<'_, &str>, context: &WorkflowContext) -> Vec<StepResult> {
        let agent = group.agent;
        match group.steps.as_slice() {
            [(_, step)] => vec![self.run_single_step(step, agent, context)],
            many => {
                let steps: Vec<&PlanStep> = many.iter().map(|(_, s)| *s).collect();
                let merged = match consolidator::consolidate_tasks(&steps, context) {
                    Some(text) => text,
                    None => {
                        return steps
                            .iter()
                            .map(|s| {
                                StepResult::unassigned(
                                    s.task.clone(),
                                    s.output_key.clone(),
                                    "Step has no task to execute",
                                )
                            })
                            .collect();
                    }
                };

                info!(agent = %agent, steps = steps.len(), "executing consolidated group");
                let outcome = self.execute(&merged, agent, context);
                steps
                    .iter()
                    .map(|s| StepResult {
                        agent: agent.to_string(),
                        task: template::render_or_original(&s.task, context),
                        output_key: s.output_key.clone(),
                        result: outcome.clone(),
                    })
                    .collect()
            }
        }
    }

    fn run_single_step(&self, step: &PlanStep, agent: &str, context: &WorkflowContext) -> StepResult {
        let task = match template::render(&step.task, context) {
            Ok(task) => task,
            Err(TemplateError::MissingKey(key)) => {
                warn!(agent = %agent, key = %key, "step references a missing context key");
                return StepResult::unassigned(
                    step.task.clone(),
                    step.output_key.clone(),
                    format!("Formatting failed, missing context key: '{key}'"),
                );
            }
            Err(e) => {
                warn!(task = %step.task, error = %e, "could not format task, using original text");
                step.task.clone()
            }
        };

        debug!(agent = %agent, task = %task, "executing step");
        let mut outcome = self.execute(&task, agent, context);

        if let Some(criteria) = step.evaluate_criteria.as_deref() {
            if !self.evaluator.accepts(&outcome, criteria) {
                info!(agent = %agent, criteria = %criteria, "result rejected, refining once");
                let revised = format!("{task}\nPlease revise to satisfy: {criteria}");
                outcome = self.execute(&revised, agent, context);
            }
        }

        StepResult {
            agent: agent.to_string(),
            task,
            output_key: step.output_key.clone(),
            result: outcome,
        }
    }

    /// Call the execution collaborator, folding any error into the outcome.
    fn execute(&self, task: &str, agent: &str, context: &WorkflowContext) -> ExecutionOutcome {
        let text = if self.config.include_context_in_tasks {
            format!("{task}{}", context.render_preview(self.config.context_preview_chars))
        } else {
            task.to_string()
        };

        match self.executor.execute(&text, Some(agent)) {
            Ok(outcome) => {
                if let Some(error) = outcome.error.as_deref() {
                    warn!(agent = %agent, error = %error, "agent reported an error");
                }
                outcome
            }
            Err(e) => {
                warn!(agent = %agent, error = %e, "agent execution failed");
                ExecutionOutcome {
                    answer: Some(format!(
                        "Sorry, I encountered an error while processing your request: {e}"
                    )),
                    error: Some(format!("Agent execution failed: {e}")),
                    extra: Default::default(),
                }
                .with_extra("agent", json!(agent))
                .with_extra("task", json!(task))
            }
        }
    }
}

/// Write a successful answer into the context. `position` is the 1-based
/// index of `result` among all results so far.
fn record_answer(context: &mut WorkflowContext, position: usize, result: &StepResult) {
    let Some(answer) = result.result.usable_answer() else {
        return;
    };
    let key = result
        .output_key
        .clone()
        .unwrap_or_else(|| format!("answer_{position}"));
    debug!(key = %key, "recorded step answer");
    context.insert(key, answer);
}
