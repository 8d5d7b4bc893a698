//! Requirement Extractor — turns a job posting into a structured requirement record.
//!
//! One LLM call per run. A reply that is not a JSON object is replaced by a fallback
//! record built from the raw job fields; the run continues either way.

use serde_json::Value;
use tracing::{info, warn};

use crate::cv::prompts::{
    fill_template, EXTRACT_PROMPT, EXTRACT_PROMPT_DESCRIPTION_ONLY, EXTRACT_SYSTEM,
    EXTRACT_SYSTEM_DESCRIPTION_ONLY,
};
use crate::cv::requirements::{ExtractedRequirements, FallbackRequirements};
use crate::cv::state::{Flow, WorkflowNode};
use crate::cv::StageContext;
use crate::errors::AppError;
use crate::llm_client::{parse_json, CompletionRequest};
use crate::models::JobRecord;

const NODE: WorkflowNode = WorkflowNode::ExtractRequirements;

pub async fn extract_requirements(flow: Flow, ctx: &StageContext<'_>) -> Result<Flow, AppError> {
    let mut state = match flow {
        Flow::Continue(state) => state,
        aborted => return Ok(aborted.record(NODE, "Skipping extraction: generation aborted")),
    };

    let request = build_request(state.job(), state.description_only(), ctx);
    let reply = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|e| AppError::llm("Requirement extraction failed", e))?;

    let requirements = interpret_reply(&reply, state.job());
    let record = requirements.to_json();
    let message = if requirements.is_fallback() {
        format!("Extraction fell back to raw job fields: {record}")
    } else {
        info!("Extracted requirements ({} fields)", record.as_object().map_or(0, |m| m.len()));
        format!("Extracted requirements: {record}")
    };

    state.set_requirements(requirements);
    state.record(NODE, message);
    Ok(Flow::Continue(state))
}

/// Parses the extraction reply, falling back to the raw job fields when the reply
/// is not a JSON object.
pub fn interpret_reply(reply: &str, job: &JobRecord) -> ExtractedRequirements {
    match parse_json::<Value>(reply) {
        Ok(Value::Object(map)) => ExtractedRequirements::Parsed(map),
        Ok(other) => {
            warn!(
                "Extraction reply was JSON but not an object ({}); using fallback record",
                json_kind(&other)
            );
            ExtractedRequirements::Fallback(FallbackRequirements::from_job(job))
        }
        Err(e) => {
            warn!("Extraction reply was not valid JSON ({e}); using fallback record");
            ExtractedRequirements::Fallback(FallbackRequirements::from_job(job))
        }
    }
}

fn build_request(job: &JobRecord, description_only: bool, ctx: &StageContext<'_>) -> CompletionRequest {
    if description_only {
        ctx.request(
            EXTRACT_SYSTEM_DESCRIPTION_ONLY,
            fill_template(
                EXTRACT_PROMPT_DESCRIPTION_ONLY,
                &[("description", job.description.as_str())],
            ),
        )
    } else {
        ctx.request(
            EXTRACT_SYSTEM,
            fill_template(
                EXTRACT_PROMPT,
                &[
                    ("title", job.title_raw.as_str()),
                    ("company", job.company.as_str()),
                    ("description", job.description.as_str()),
                    ("job_category", job.job_category.as_str()),
                    ("role", job.role_k50.as_str()),
                ],
            ),
        )
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
