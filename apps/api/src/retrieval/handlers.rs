//! Axum route handlers for ingestion, matching, and retrieval evaluation.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::retrieval::{
    analyze_match, build_index, corpus, embed_query, evaluate_single_job, retrieve_similar_offers,
    IngestSource, RetrievalEvaluation, RetrievedOffer, DEFAULT_EVALUATION_K,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub source: IngestSource,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub source: IngestSource,
    pub documents: usize,
    pub dim: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub cv_text: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub offers: Vec<RetrievedOffer>,
    pub analysis: String,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub job_id: String,
    pub cv_text: String,
    pub k: Option<usize>,
}

/// POST /api/v1/index/ingest
///
/// Embeds the chosen corpus, persists the new index, then swaps it in.
/// Searches keep using the previous index until the swap. Ingests run one at a
/// time, so the snapshot on disk always matches the index in memory.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let _ingesting = state.ingest_lock.lock().await;

    let source = request.source;
    let offers_dir = state.config.job_offers_dir.clone();
    let jobs = Arc::clone(&state.jobs);
    let documents = blocking(move || corpus(source, &offers_dir, &jobs)).await?;

    let index = build_index(
        documents,
        state.embedder.as_ref(),
        state.config.embedding_batch_size,
    )
    .await?;

    let path = state.config.vector_index_path.clone();
    let index = blocking(move || {
        index.save(&path)?;
        Ok(index)
    })
    .await?;

    let response = IngestResponse {
        source,
        documents: index.len(),
        dim: index.dim(),
    };
    *state.index.write().await = index;
    info!("Ingested {} documents from {:?}", response.documents, response.source);

    Ok(Json(response))
}

/// Runs filesystem work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

/// POST /api/v1/match
///
/// Retrieves the closest offers for a CV and asks the analysis model to compare them.
pub async fn handle_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    if request.cv_text.trim().is_empty() {
        return Err(AppError::Validation("cv_text cannot be empty".to_string()));
    }

    let offers = retrieve_similar_offers(
        &request.cv_text,
        state.embedder.as_ref(),
        &state.index,
        &state.config.retrieval,
    )
    .await?;
    let analysis = analyze_match(
        &request.cv_text,
        &offers,
        state.llm.as_ref(),
        &state.config.analysis,
    )
    .await?;

    Ok(Json(MatchResponse { offers, analysis }))
}

/// POST /api/v1/evaluate/retrieval
pub async fn handle_evaluate_retrieval(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<RetrievalEvaluation>, AppError> {
    if request.job_id.trim().is_empty() {
        return Err(AppError::Validation("job_id cannot be empty".to_string()));
    }
    if request.cv_text.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "No CV text provided for job {}",
            request.job_id
        )));
    }
    let k = request.k.unwrap_or(DEFAULT_EVALUATION_K);
    if k == 0 {
        return Err(AppError::Validation("k must be at least 1".to_string()));
    }

    let cv_vector = embed_query(state.embedder.as_ref(), &request.cv_text).await?;
    let index = state.index.read().await;
    let report = evaluate_single_job(&request.job_id, &cv_vector, k, &index, &state.jobs)?;

    Ok(Json(report))
}
