pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::cv::handlers as cv;
use crate::jobs::handlers as jobs;
use crate::retrieval::handlers as retrieval;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // CV generation
        .route("/api/v1/cv/generate", post(cv::handle_generate))
        .route("/api/v1/cv/batch", post(cv::handle_batch))
        .route("/api/v1/requirements/extract", post(cv::handle_extract))
        // Job store
        .route("/api/v1/jobs/:job_id", get(jobs::handle_get_job))
        // Retrieval
        .route("/api/v1/index/ingest", post(retrieval::handle_ingest))
        .route("/api/v1/match", post(retrieval::handle_match))
        .route(
            "/api/v1/evaluate/retrieval",
            post(retrieval::handle_evaluate_retrieval),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tokio::sync::{Mutex, RwLock};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::cv::workflow::CvWorkflow;
    use crate::index::VectorIndex;
    use crate::jobs::JobStore;
    use crate::llm_client::testing::{FakeEmbedder, ScriptedLlm};
    use crate::models::JobRecord;

    fn test_state(dir: &Path, llm: Arc<ScriptedLlm>, embedder: FakeEmbedder) -> AppState {
        let config = Config::for_tests(dir);
        let jobs = JobStore::from_records(vec![
            JobRecord {
                job_id: Some("1".into()),
                title_raw: "Data Analyst".into(),
                company: "Acme".into(),
                description: "SQL reporting".into(),
                role_k50: "analytics".into(),
                ..JobRecord::default()
            },
            JobRecord {
                job_id: Some("2".into()),
                title_raw: "Nurse".into(),
                company: "Clinic".into(),
                description: "Patient care".into(),
                role_k50: "care".into(),
                ..JobRecord::default()
            },
        ]);
        AppState {
            llm: llm.clone(),
            embedder: Arc::new(embedder),
            workflow: CvWorkflow::new(llm, config.cv.clone(), config.gate),
            config,
            index: Arc::new(RwLock::new(VectorIndex::new())),
            ingest_lock: Arc::new(Mutex::new(())),
            jobs: Arc::new(jobs),
        }
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), Arc::default(), FakeEmbedder::new(2)));

        let (status, body) = send(app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "jobmatch-api");
        assert_eq!(body["stored_jobs"], 2);
    }

    #[tokio::test]
    async fn test_generate_requires_exactly_one_job_source() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::default());
        let state = test_state(dir.path(), llm.clone(), FakeEmbedder::new(2));

        let (neither, _) = send(build_router(state.clone()), "POST", "/api/v1/cv/generate", Some(json!({}))).await;
        let both = json!({"job": {"description": "x"}, "job_id": "1"});
        let (both, body) = send(build_router(state), "POST", "/api/v1/cv/generate", Some(both)).await;

        assert_eq!(neither, StatusCode::BAD_REQUEST);
        assert_eq!(both, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_unknown_job_id_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), Arc::default(), FakeEmbedder::new(2)));

        let (status, _) = send(app, "POST", "/api/v1/cv/generate", Some(json!({"job_id": "99"}))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_vague_description_returns_na() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[
            r#"{"required_skills": [], "key_responsibilities": []}"#,
            r#"{"sufficient": false, "reason": "too vague"}"#,
        ]));
        let app = build_router(test_state(dir.path(), llm.clone(), FakeEmbedder::new(2)));
        let body = json!({"job": {"description": "Developer"}, "description_only": true});

        let (status, body) = send(app, "POST", "/api/v1/cv/generate", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["final_cv"], "NA");
        assert_eq!(body["aborted"], true);
        assert_eq!(body["cv_sections"], json!({}));
        assert_eq!(body["gate"]["path"], "insufficient");
        assert!(body["request_id"].is_string());
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_missing_description_ends_at_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[
            "{}",
            r#"{"sufficient": false, "reason": "no description"}"#,
        ]));
        let app = build_router(test_state(dir.path(), llm.clone(), FakeEmbedder::new(2)));
        let body = json!({"job": {"title_raw": "Dev"}, "description_only": true});

        let (status, body) = send(app, "POST", "/api/v1/cv/generate", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aborted"], true);
        assert_eq!(body["final_cv"], "NA");
        assert_eq!(body["abort_reason"], "no description");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_llm_outage_is_502() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), Arc::default(), FakeEmbedder::new(2)));

        let (status, body) = send(app, "POST", "/api/v1/cv/generate", Some(json!({"job_id": "1"}))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "LLM_ERROR");
    }

    #[tokio::test]
    async fn test_batch_runs_each_stored_job() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::default().with_default("TEXT"));
        let app = build_router(test_state(dir.path(), llm, FakeEmbedder::new(2)));

        let (status, body) = send(
            app,
            "POST",
            "/api/v1/cv/batch",
            Some(json!({"job_ids": ["2", "1"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], 2);
        assert_eq!(body["items"][0]["job_id"], "2");
        assert_eq!(body["items"][0]["status"], "completed");
        assert_eq!(body["items"][1]["outcome"]["final_cv"], "TEXT");
    }

    #[tokio::test]
    async fn test_extract_preview() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::replying(&[r#"{"required_skills": ["SQL"]}"#]));
        let app = build_router(test_state(dir.path(), llm.clone(), FakeEmbedder::new(2)));

        let (status, body) = send(
            app,
            "POST",
            "/api/v1/requirements/extract",
            Some(json!({"job_id": "1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["extracted_requirements"]["source"], "parsed");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_job() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), Arc::default(), FakeEmbedder::new(2));

        let (found, body) = send(build_router(state.clone()), "GET", "/api/v1/jobs/2", None).await;
        let (missing, _) = send(build_router(state), "GET", "/api/v1/jobs/3", None).await;

        assert_eq!(found, StatusCode::OK);
        assert_eq!(body["title_raw"], "Nurse");
        assert_eq!(missing, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ingest_then_match_and_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = FakeEmbedder::new(2)
            .with("SQL reporting", vec![1.0, 0.0])
            .with("Patient care", vec![0.0, 1.0])
            .with("I write SQL", vec![0.9, 0.0]);
        let llm = Arc::new(ScriptedLlm::replying(&["The analyst role fits."]));
        let state = test_state(dir.path(), llm, embedder);

        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            "/api/v1/index/ingest",
            Some(json!({"source": "job_store"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"], 2);
        assert!(dir.path().join("embeddings.idx").exists());

        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            "/api/v1/match",
            Some(json!({"cv_text": "I write SQL"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["offers"][0]["id"], "1");
        assert_eq!(body["analysis"], "The analyst role fits.");

        let (status, body) = send(
            build_router(state),
            "POST",
            "/api/v1/evaluate/retrieval",
            Some(json!({"job_id": "1", "cv_text": "I write SQL"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rank"], 1);
        assert_eq!(body["k"], 10);
        assert_eq!(body["same_cluster_ratio"], 0.1);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_leave_index_and_snapshot_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), Arc::default(), FakeEmbedder::new(2));
        let ingest = json!({"source": "job_store"});

        let (first, second) = tokio::join!(
            send(build_router(state.clone()), "POST", "/api/v1/index/ingest", Some(ingest.clone())),
            send(build_router(state.clone()), "POST", "/api/v1/index/ingest", Some(ingest)),
        );

        assert_eq!(first.0, StatusCode::OK);
        assert_eq!(second.0, StatusCode::OK);
        let on_disk = VectorIndex::load(&dir.path().join("embeddings.idx")).unwrap();
        assert_eq!(on_disk.len(), state.index.read().await.len());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("job_offers")).unwrap();
        let app = build_router(test_state(dir.path(), Arc::default(), FakeEmbedder::new(2)));

        let (status, _) = send(
            app,
            "POST",
            "/api/v1/index/ingest",
            Some(json!({"source": "directory"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_match_rejects_empty_cv_text() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), Arc::default(), FakeEmbedder::new(2)));

        let (status, _) = send(app, "POST", "/api/v1/match", Some(json!({"cv_text": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
