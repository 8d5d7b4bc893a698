use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::cv::workflow::CvWorkflow;
use crate::index::VectorIndex;
use crate::jobs::JobStore;
use crate::llm_client::{EmbeddingProvider, LlmProvider};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub config: Config,
    /// Rebuilt wholesale by ingestion; searches take the read lock.
    pub index: Arc<RwLock<VectorIndex>>,
    /// Held by ingestion from corpus load through save and swap.
    pub ingest_lock: Arc<Mutex<()>>,
    pub jobs: Arc<JobStore>,
    pub workflow: CvWorkflow,
}
