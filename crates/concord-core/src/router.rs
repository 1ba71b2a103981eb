//! Agent router: pick one agent for a task.
//!
//! Routing never fails once there is at least one candidate. An unknown
//! answer or a reasoning error both land on the first candidate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use concord_contracts::agent::AgentDescriptor;

use crate::traits::ReasoningService;

const QUOTE_CHARS: [char; 3] = ['"', '\'', '`'];

pub struct AgentRouter {
    reasoning: Arc<dyn ReasoningService>,
    temperature: f32,
}

impl AgentRouter {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            reasoning,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_prompt(task: &str, agents: &[AgentDescriptor]) -> String {
        let listing = agents
            .iter()
            .map(|a| {
                let purpose = if a.purpose.trim().is_empty() {
                    "No purpose defined."
                } else {
                    a.purpose.as_str()
                };
                format!("- Agent Name: {}\n  Purpose: {}", a.name, purpose)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an intelligent routing assistant. Your job is to select the best agent for a \
             specific task based on the agent's stated purpose.\n\n\
             Here are the available agents:\n{listing}\n\n\
             Review the following task and choose the most appropriate agent.\n\
             Task: \"{task}\"\n\n\
             Respond with ONLY the name of the chosen agent from the list. Do not add any explanation or other text."
        )
    }

    /// Choose the agent for `task`. `None` only when `agents` is empty.
    pub fn route<'a>(&self, task: &str, agents: &'a [AgentDescriptor]) -> Option<&'a AgentDescriptor> {
        let first = match agents.first() {
            Some(first) => first,
            None => {
                warn!("routing failed: no candidate agents");
                return None;
            }
        };

        let prompt = Self::build_prompt(task, agents);
        let reply = match self.reasoning.complete(&prompt, self.temperature) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, fallback = %first.name, "routing call failed, using first agent");
                return Some(first);
            }
        };

        let chosen = normalize_choice(&reply);
        debug!(chosen = %chosen, task = %task, "reasoning service selected agent");

        match agents.iter().find(|a| a.name_matches(&chosen)) {
            Some(agent) => {
                info!(agent = %agent.name, "routed task");
                Some(agent)
            }
            None => {
                warn!(chosen = %chosen, fallback = %first.name, "selected agent not in candidate list, using first agent");
                Some(first)
            }
        }
    }
}

/// Strip quoting characters and surrounding whitespace from a routing reply.
fn normalize_choice(reply: &str) -> String {
    reply
        .chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
