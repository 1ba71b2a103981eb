//! Strict decoding of reasoning-service plan output.
//!
//! Decoding runs in three phases:
//!
//! 1. Strip a surrounding markdown code fence, if any.
//! 2. Parse JSON and validate it against [`plan_schema`] with `jsonschema`.
//! 3. Deserialize the validated document into a `Plan` with serde.
//!
//! Every schema violation is collected into a single failure reason.

use serde_json::{json, Value};
use tracing::{debug, warn};

use concord_contracts::{
    error::{ConcordError, ConcordResult},
    plan::{Plan, PlanningFailure},
};
use concord_core::traits::PlanDecoder;

/// The JSON Schema every decoded plan must satisfy.
pub fn plan_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "required": ["task"],
            "properties": {
                "task": { "type": "string" },
                "output_key": {
                    "type": "string",
                    "pattern": "^[A-Za-z_][A-Za-z0-9_]*$"
                },
                "evaluate_criteria": { "type": "string" }
            }
        }
    })
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and a trailing
/// fence. Text without a fence is returned trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// `PlanDecoder` backed by a compiled JSON Schema.
pub struct SchemaPlanDecoder {
    validator: jsonschema::Validator,
}

impl SchemaPlanDecoder {
    /// Compile [`plan_schema`].
    ///
    /// Returns `ConcordError::Config` if the schema fails to compile.
    pub fn new() -> ConcordResult<Self> {
        let validator = jsonschema::validator_for(&plan_schema()).map_err(|e| ConcordError::Config {
            reason: format!("invalid plan schema: {e}"),
        })?;
        Ok(Self { validator })
    }
}

impl PlanDecoder for SchemaPlanDecoder {
    fn decode(&self, raw: &str) -> Result<Plan, PlanningFailure> {
        let body = strip_code_fence(raw);

        let document: Value = serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, "plan response is not valid JSON");
            PlanningFailure::Malformed(e.to_string())
        })?;

        let violations: Vec<String> = self
            .validator
            .iter_errors(&document)
            .map(|error| format!("at '{}': {}", error.instance_path, error))
            .collect();
        if !violations.is_empty() {
            warn!(violations = violations.len(), "plan response failed schema validation");
            return Err(PlanningFailure::InvalidShape(violations.join("; ")));
        }

        let plan: Plan = serde_json::from_value(document)
            .map_err(|e| PlanningFailure::InvalidShape(e.to_string()))?;
        debug!(steps = plan.len(), "plan decoded");
        Ok(plan)
    }
}
