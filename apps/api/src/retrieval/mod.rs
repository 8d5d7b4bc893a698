// Retrieval: job-offer ingestion, similarity search, match analysis, and retrieval evaluation.
// Embeddings come from the `EmbeddingProvider`; search runs on the shared `VectorIndex`.

pub mod handlers;
pub mod prompts;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{AnalysisModelConfig, RetrievalConfig};
use crate::cv::prompts::fill_template;
use crate::errors::AppError;
use crate::index::{IndexedDocument, VectorIndex};
use crate::jobs::{load_texts, JobStore};
use crate::llm_client::{CompletionRequest, EmbeddingProvider, LlmProvider};
use crate::retrieval::prompts::{MATCH_PROMPT, MATCH_SYSTEM};

/// Default `k` for single-job evaluation.
pub const DEFAULT_EVALUATION_K: usize = 10;

/// Hits from another cluster count a quarter as much toward the retrieval score.
const OTHER_CLUSTER_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    /// `.txt` / `.md` files under the offers directory; id is the relative path.
    Directory,
    /// Job store rows with an id and a non-empty description.
    JobStore,
}

/// Collects the documents to embed for `source`.
pub fn corpus(
    source: IngestSource,
    offers_dir: &std::path::Path,
    jobs: &JobStore,
) -> Result<Vec<IndexedDocument>, AppError> {
    let documents: Vec<IndexedDocument> = match source {
        IngestSource::Directory => load_texts(offers_dir)?
            .into_iter()
            .map(|(id, text)| IndexedDocument { id, text })
            .collect(),
        IngestSource::JobStore => jobs
            .iter()
            .filter(|job| !job.description.trim().is_empty())
            .filter_map(|job| {
                job.job_id.clone().map(|id| IndexedDocument {
                    id,
                    text: job.description.clone(),
                })
            })
            .collect(),
    };

    if documents.is_empty() {
        return Err(AppError::Validation(format!(
            "no documents to ingest from {source:?}"
        )));
    }
    Ok(documents)
}

/// Embeds `documents` in batches of `batch_size` and builds a fresh index.
pub async fn build_index(
    documents: Vec<IndexedDocument>,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<VectorIndex, AppError> {
    let mut vectors = Vec::with_capacity(documents.len());
    for batch in documents.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let embedded = embedder
            .embed(&texts)
            .await
            .map_err(|e| AppError::Embedding(format!("Embedding job offers failed: {e}")))?;
        vectors.extend(embedded);
    }

    let mut index = VectorIndex::new();
    index.add(documents, vectors)?;
    info!("Indexed {} job offers", index.len());
    Ok(index)
}

pub async fn embed_query(embedder: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>, AppError> {
    embedder
        .embed(&[text.to_string()])
        .await
        .map_err(|e| AppError::Embedding(format!("Embedding query failed: {e}")))?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Embedding("Embedding query returned no vector".to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedOffer {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

/// Searches `top_k` neighbours of `query`. With reranking on, hits are stably
/// re-sorted by `distance × rerank_weight`.
pub fn rank_offers(
    index: &VectorIndex,
    query: &[f32],
    retrieval: &RetrievalConfig,
) -> Result<Vec<RetrievedOffer>, AppError> {
    let (distances, positions) = index.search(query, retrieval.top_k)?;
    let mut offers: Vec<RetrievedOffer> = positions
        .into_iter()
        .zip(distances)
        .filter_map(|(position, distance)| {
            index.document(position).map(|doc| RetrievedOffer {
                id: doc.id.clone(),
                text: doc.text.clone(),
                distance,
            })
        })
        .collect();

    if retrieval.use_rerank {
        let weight = retrieval.rerank_weight;
        offers.sort_by(|a, b| {
            (a.distance * weight)
                .partial_cmp(&(b.distance * weight))
                .unwrap_or(Ordering::Equal)
        });
    }
    Ok(offers)
}

pub async fn retrieve_similar_offers(
    query_text: &str,
    embedder: &dyn EmbeddingProvider,
    index: &RwLock<VectorIndex>,
    retrieval: &RetrievalConfig,
) -> Result<Vec<RetrievedOffer>, AppError> {
    let query = embed_query(embedder, query_text).await?;
    let index = index.read().await;
    if index.is_empty() {
        return Err(AppError::Validation(
            "the vector index is empty; ingest job offers first".to_string(),
        ));
    }
    rank_offers(&index, &query, retrieval)
}

/// One LLM call comparing the candidate profile with the retrieved offers.
/// The reply is returned verbatim.
pub async fn analyze_match(
    cv_text: &str,
    offers: &[RetrievedOffer],
    llm: &dyn LlmProvider,
    model: &AnalysisModelConfig,
) -> Result<String, AppError> {
    let context = offers
        .iter()
        .map(|o| o.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let request = CompletionRequest {
        system: MATCH_SYSTEM.to_string(),
        prompt: fill_template(MATCH_PROMPT, &[("cv_text", cv_text), ("offers", context.as_str())]),
        model: model.model.clone(),
        temperature: model.temperature,
        max_tokens: Some(model.max_tokens),
    };

    llm.complete(&request)
        .await
        .map_err(|e| AppError::llm("Match analysis failed", e))
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationHit {
    pub rank: usize,
    pub job_id: String,
    pub title: Option<String>,
    pub cluster: Option<String>,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalEvaluation {
    pub job_id: String,
    pub k: usize,
    /// 1-based rank of the target among the hits.
    pub rank: Option<usize>,
    /// `1 / (1 + distance)` of the target hit.
    pub similarity: Option<f32>,
    /// Present when the target job has a cluster label in the store.
    pub same_cluster_ratio: Option<f64>,
    pub retrieval_score: Option<f64>,
    pub hits: Vec<EvaluationHit>,
}

pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Searches `k` neighbours of a CV embedding and reports where `job_id` lands.
pub fn evaluate_single_job(
    job_id: &str,
    cv_vector: &[f32],
    k: usize,
    index: &VectorIndex,
    jobs: &JobStore,
) -> Result<RetrievalEvaluation, AppError> {
    let (distances, positions) = index.search(cv_vector, k)?;

    let hits: Vec<EvaluationHit> = positions
        .into_iter()
        .zip(distances)
        .filter_map(|(position, distance)| index.document(position).map(|doc| (doc, distance)))
        .enumerate()
        .map(|(i, (doc, distance))| {
            let job = jobs.get(&doc.id);
            EvaluationHit {
                rank: i + 1,
                job_id: doc.id.clone(),
                title: job.map(|j| j.title_raw.clone()),
                cluster: job.map(|j| j.role_k50.clone()).filter(|c| !c.is_empty()),
                distance,
            }
        })
        .collect();

    let target = hits.iter().find(|h| h.job_id == job_id);
    let rank = target.map(|h| h.rank);
    let target_similarity = target.map(|h| similarity(h.distance));

    let cv_cluster = jobs
        .get(job_id)
        .map(|j| j.role_k50.clone())
        .filter(|c| !c.is_empty());
    let (ratio, score) = match &cv_cluster {
        Some(cluster) => {
            let expected = Some(cluster.clone());
            let clusters: Vec<Option<String>> = hits.iter().map(|h| h.cluster.clone()).collect();
            let similarities: Vec<f64> = hits
                .iter()
                .map(|h| f64::from(similarity(h.distance)))
                .collect();
            (
                Some(same_cluster_ratio(&clusters, &expected, k)),
                Some(retrieval_score(&similarities, &clusters, &expected)),
            )
        }
        None => (None, None),
    };

    match rank {
        Some(rank) => info!("Job {job_id} retrieved at rank {rank}/{k}"),
        None => info!("Job {job_id} not found in top {k} results"),
    }

    Ok(RetrievalEvaluation {
        job_id: job_id.to_string(),
        k,
        rank,
        similarity: target_similarity,
        same_cluster_ratio: ratio,
        retrieval_score: score,
        hits,
    })
}

/// Mean of `similarity × weight`, where same-cluster hits weigh 1.0 and the rest 0.25.
pub fn retrieval_score<C: PartialEq>(similarities: &[f64], retrieved_clusters: &[C], cv_cluster: &C) -> f64 {
    let weighted: Vec<f64> = similarities
        .iter()
        .zip(retrieved_clusters)
        .map(|(sim, cluster)| {
            let weight = if cluster == cv_cluster {
                1.0
            } else {
                OTHER_CLUSTER_WEIGHT
            };
            sim * weight
        })
        .collect();

    if weighted.is_empty() {
        return 0.0;
    }
    weighted.iter().sum::<f64>() / weighted.len() as f64
}

/// Share of the `k` requested hits that sit in the CV's cluster.
pub fn same_cluster_ratio<C: PartialEq>(retrieved_clusters: &[C], cv_cluster: &C, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let same = retrieved_clusters.iter().filter(|c| *c == cv_cluster).count();
    same as f64 / k as f64
}
