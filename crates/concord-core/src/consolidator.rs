//! Step consolidation.
//!
//! Two levels: a whole plan whose steps all route to one agent collapses to a
//! single step ([`merge_plan`]), and within the executor a run of steps bound
//! for the same agent is merged into one request ([`consolidate_tasks`]).

use tracing::{debug, warn};

use concord_contracts::{
    plan::{Plan, PlanStep},
    workflow::WorkflowContext,
};

use crate::template;

/// Output key of a plan produced by [`merge_plan`].
pub const CONSOLIDATED_OUTPUT_KEY: &str = "consolidated_analysis";

const HEADER: &str = "Please perform the following analysis tasks comprehensively:\n\n";
const FOOTER: &str =
    "\nPlease provide a complete analysis covering all the above tasks in a single comprehensive response.";

/// Number `tasks` into one request.
pub fn enumerate_tasks<S: AsRef<str>>(tasks: &[S]) -> String {
    let mut out = String::from(HEADER);
    for (i, task) in tasks.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, task.as_ref()));
    }
    out.push_str(FOOTER);
    out
}

/// Collapse every step of `plan` into one comprehensive step.
pub fn merge_plan(plan: &Plan) -> Plan {
    let tasks: Vec<&str> = plan.iter().map(|s| s.task.as_str()).collect();
    Plan::new(vec![PlanStep::new(enumerate_tasks(&tasks), CONSOLIDATED_OUTPUT_KEY)])
}

/// Build the single request text for a group of steps.
///
/// Each step is substituted against `context`; a step that cannot be
/// substituted contributes its original text. Empty texts are skipped.
/// Returns `None` when nothing is left.
pub fn consolidate_tasks(steps: &[&PlanStep], context: &WorkflowContext) -> Option<String> {
    let tasks: Vec<String> = steps
        .iter()
        .map(|s| template::render_or_original(&s.task, context))
        .filter(|t| !t.trim().is_empty())
        .collect();

    match tasks.len() {
        0 => {
            warn!("no task text to consolidate");
            None
        }
        1 => tasks.into_iter().next(),
        n => {
            debug!(tasks = n, "consolidated tasks into one request");
            Some(enumerate_tasks(&tasks))
        }
    }
}

/// Steps bound for one agent, with their original plan positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGroup<'p, A> {
    pub agent: A,
    pub steps: Vec<(usize, &'p PlanStep)>,
}

/// Group routed steps by agent, preserving first-appearance order of agents
/// and plan order within a group.
pub fn group_by_agent<'p, A, I>(assignments: I) -> Vec<StepGroup<'p, A>>
where
    A: PartialEq,
    I: IntoIterator<Item = (usize, &'p PlanStep, A)>,
{
    let mut groups: Vec<StepGroup<'p, A>> = Vec::new();
    for (index, step, agent) in assignments {
        match groups.iter_mut().find(|g| g.agent == agent) {
            Some(group) => group.steps.push((index, step)),
            None => groups.push(StepGroup {
                agent,
                steps: vec![(index, step)],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_plan_enumerates_every_step() {
        let plan = Plan::new(vec![
            PlanStep::new("Check current inventory levels", "inventory"),
            PlanStep::new("Calculate turnover rates", "turnover"),
        ]);
        let merged = merge_plan(&plan);
        assert_eq!(merged.len(), 1);
        let step = &merged.steps()[0];
        assert_eq!(step.output_key.as_deref(), Some("consolidated_analysis"));
        assert_eq!(
            step.task,
            "Please perform the following analysis tasks comprehensively:\n\n\
             1. Check current inventory levels\n\
             2. Calculate turnover rates\n\
             \nPlease provide a complete analysis covering all the above tasks in a single comprehensive response."
        );
    }

    #[test]
    fn single_task_is_returned_verbatim() {
        let step = PlanStep::new("Check stock for {item}", "stock");
        let mut ctx = WorkflowContext::new();
        ctx.insert("item", "bolts");
        assert_eq!(consolidate_tasks(&[&step], &ctx).as_deref(), Some("Check stock for bolts"));
    }

    #[test]
    fn empty_tasks_are_skipped() {
        let a = PlanStep::new("  ", "a");
        let b = PlanStep::new("", "b");
        assert_eq!(consolidate_tasks(&[&a, &b], &WorkflowContext::new()), None);

        let c = PlanStep::new("Real work", "c");
        assert_eq!(
            consolidate_tasks(&[&a, &c], &WorkflowContext::new()).as_deref(),
            Some("Real work")
        );
    }

    #[test]
    fn unsubstitutable_step_keeps_original_text() {
        let a = PlanStep::new("Use {missing}", "a");
        let b = PlanStep::new("Second", "b");
        let text = consolidate_tasks(&[&a, &b], &WorkflowContext::new()).unwrap();
        assert!(text.contains("1. Use {missing}\n"));
        assert!(text.contains("2. Second\n"));
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let s: Vec<PlanStep> = (0..4).map(|i| PlanStep::new(format!("t{i}"), format!("k{i}"))).collect();
        let groups = group_by_agent(vec![
            (0, &s[0], "B"),
            (1, &s[1], "A"),
            (2, &s[2], "B"),
            (3, &s[3], "C"),
        ]);
        let order: Vec<&str> = groups.iter().map(|g| g.agent).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
        let b_indices: Vec<usize> = groups[0].steps.iter().map(|(i, _)| *i).collect();
        assert_eq!(b_indices, vec![0, 2]);
    }
}
