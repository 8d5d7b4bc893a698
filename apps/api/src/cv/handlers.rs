//! Axum route handlers for the CV Generation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cv::requirements::ExtractedRequirements;
use crate::cv::state::CvOutcome;
use crate::cv::workflow::{BatchItem, BatchResult};
use crate::errors::AppError;
use crate::models::JobRecord;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Either an inline job or the id of a stored one, never both.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub job: Option<JobRecord>,
    pub job_id: Option<String>,
    #[serde(default)]
    pub description_only: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub outcome: CvOutcome,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub job_ids: Vec<String>,
    #[serde(default)]
    pub description_only: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub request_id: Uuid,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub extracted_requirements: ExtractedRequirements,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cv/generate
///
/// Runs the full workflow for one job. A vague description in description-only
/// mode is not an error: the outcome carries `final_cv = "NA"` and the reason.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let job = resolve_job(&state, request.job, request.job_id)?;
    let request_id = Uuid::new_v4();
    info!(
        "Generating CV {request_id} (job_id={:?}, description_only={})",
        job.job_id, request.description_only
    );

    let outcome = state.workflow.run(job, request.description_only).await?;

    Ok(Json(GenerateResponse {
        request_id,
        outcome,
    }))
}

/// POST /api/v1/cv/batch
///
/// Runs one independent workflow per stored job id. Failures are reported per item.
pub async fn handle_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if request.job_ids.is_empty() {
        return Err(AppError::Validation("job_ids cannot be empty".to_string()));
    }

    let missing: Vec<&str> = request
        .job_ids
        .iter()
        .filter(|id| state.jobs.get(id).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "Jobs not found: {}",
            missing.join(", ")
        )));
    }

    let jobs: Vec<JobRecord> = request
        .job_ids
        .iter()
        .filter_map(|id| state.jobs.get(id).cloned())
        .collect();
    let request_id = Uuid::new_v4();
    info!("Batch {request_id}: generating {} CVs", jobs.len());

    let items = state
        .workflow
        .run_batch(jobs, request.description_only, state.config.batch_concurrency)
        .await;
    let failed = items
        .iter()
        .filter(|i| matches!(i.result, BatchResult::Failed { .. }))
        .count();

    Ok(Json(BatchResponse {
        request_id,
        completed: items.len() - failed,
        failed,
        items,
    }))
}

/// POST /api/v1/requirements/extract
///
/// Runs extraction only. Useful for previewing what the later stages will see.
pub async fn handle_extract(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let job = resolve_job(&state, request.job, request.job_id)?;
    let extracted_requirements = state.workflow.extract(job, request.description_only).await?;
    Ok(Json(ExtractResponse {
        extracted_requirements,
    }))
}

/// Missing job fields read as empty strings. An empty description in
/// description-only mode runs the workflow and ends at the gate.
fn resolve_job(
    state: &AppState,
    job: Option<JobRecord>,
    job_id: Option<String>,
) -> Result<JobRecord, AppError> {
    match (job, job_id) {
        (Some(job), None) => Ok(job),
        (None, Some(job_id)) => state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found"))),
        _ => Err(AppError::Validation(
            "provide exactly one of job or job_id".to_string(),
        )),
    }
}
