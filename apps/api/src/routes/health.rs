use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status with the number of indexed offers and stored jobs.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let indexed = state.index.read().await.len();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "jobmatch-api",
        "indexed_offers": indexed,
        "stored_jobs": state.jobs.len()
    }))
}
