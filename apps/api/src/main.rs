mod config;
mod cv;
mod errors;
mod index;
mod jobs;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::cv::workflow::CvWorkflow;
use crate::index::VectorIndex;
use crate::jobs::JobStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or invalid env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobmatch API v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client serves chat completions and embeddings
    let client = Arc::new(LlmClient::new(
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
        Duration::from_secs(config.llm_timeout_secs),
        config.llm_max_attempts,
    )?);
    info!(
        "LLM client initialized (cv model: {}, analysis model: {}, embeddings: {})",
        config.cv.model, config.analysis.model, config.embedding_model
    );

    let index = VectorIndex::load_or_empty(&config.vector_index_path)?;
    let jobs = JobStore::load(&config.job_store_path)?;

    let workflow = CvWorkflow::new(client.clone(), config.cv.clone(), config.gate);

    let state = AppState {
        llm: client.clone(),
        embedder: client,
        config: config.clone(),
        index: Arc::new(RwLock::new(index)),
        ingest_lock: Arc::new(Mutex::new(())),
        jobs: Arc::new(jobs),
        workflow,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
