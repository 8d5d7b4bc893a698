//! CV Workflow — walks the fixed node graph from `extract_requirements` to `compile_cv`.
//!
//! Flow: extract_requirements → check_description → generate_experience →
//!       generate_skills → generate_education → compile_cv → END
//!
//! Every edge is unconditional. The gate's abort is carried by `Flow::Aborted` and
//! each later node decides for itself to skip its LLM call.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::CvModelConfig;
use crate::cv::compiler::compile_cv;
use crate::cv::extractor::extract_requirements;
use crate::cv::gate::{check_specificity, GateThresholds};
use crate::cv::requirements::{ExtractedRequirements, FallbackRequirements};
use crate::cv::sections::generate_section;
use crate::cv::state::{CvOutcome, Flow, GenerationState, SectionKind, WorkflowNode};
use crate::cv::StageContext;
use crate::errors::AppError;
use crate::llm_client::LlmProvider;
use crate::models::JobRecord;

/// Per-job result inside a batch run.
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub result: BatchResult,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResult {
    Completed { outcome: Box<CvOutcome> },
    Failed { error: String },
}

#[derive(Clone)]
pub struct CvWorkflow {
    llm: Arc<dyn LlmProvider>,
    model: CvModelConfig,
    gate: GateThresholds,
}

impl CvWorkflow {
    pub fn new(llm: Arc<dyn LlmProvider>, model: CvModelConfig, gate: GateThresholds) -> Self {
        Self { llm, model, gate }
    }

    fn context(&self) -> StageContext<'_> {
        StageContext {
            llm: self.llm.as_ref(),
            model: &self.model,
            gate: &self.gate,
        }
    }

    /// Runs one generation request end to end. Any fatal LLM failure aborts the
    /// request with no partial output.
    pub async fn run(&self, job: JobRecord, description_only: bool) -> Result<CvOutcome, AppError> {
        let started = Instant::now();
        let ctx = self.context();
        let mut flow = Flow::Continue(GenerationState::new(Arc::new(job), description_only));
        let mut node = Some(WorkflowNode::ENTRY);

        while let Some(current) = node {
            flow = step(current, flow, &ctx).await?;
            node = current.next();
        }

        let outcome = CvOutcome::from(flow);
        info!(
            "CV workflow finished in {}ms (aborted={}, sections={})",
            started.elapsed().as_millis(),
            outcome.aborted,
            outcome.cv_sections.len()
        );
        Ok(outcome)
    }

    /// Runs only the extraction node.
    pub async fn extract(
        &self,
        job: JobRecord,
        description_only: bool,
    ) -> Result<ExtractedRequirements, AppError> {
        let job = Arc::new(job);
        let flow = Flow::Continue(GenerationState::new(Arc::clone(&job), description_only));
        let flow = extract_requirements(flow, &self.context()).await?;
        Ok(flow
            .state()
            .requirements()
            .cloned()
            .unwrap_or_else(|| ExtractedRequirements::Fallback(FallbackRequirements::from_job(&job))))
    }

    /// Runs independent requests with at most `concurrency` in flight.
    /// Results keep input order; a failed job does not fail the batch.
    pub async fn run_batch(
        &self,
        jobs: Vec<JobRecord>,
        description_only: bool,
        concurrency: usize,
    ) -> Vec<BatchItem> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let job_ids: Vec<Option<String>> = jobs.iter().map(|j| j.job_id.clone()).collect();
        let mut tasks = JoinSet::new();

        for (position, job) in jobs.into_iter().enumerate() {
            let workflow = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match workflow.run(job, description_only).await {
                    Ok(outcome) => BatchResult::Completed {
                        outcome: Box::new(outcome),
                    },
                    Err(e) => BatchResult::Failed {
                        error: e.to_string(),
                    },
                };
                (position, result)
            });
        }

        let mut results: Vec<Option<BatchResult>> = job_ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(e) => error!("Batch generation task failed: {e}"),
            }
        }

        job_ids
            .into_iter()
            .zip(results)
            .map(|(job_id, result)| BatchItem {
                job_id,
                result: result.unwrap_or_else(|| BatchResult::Failed {
                    error: "generation task did not complete".to_string(),
                }),
            })
            .collect()
    }
}

async fn step(node: WorkflowNode, flow: Flow, ctx: &StageContext<'_>) -> Result<Flow, AppError> {
    match node {
        WorkflowNode::ExtractRequirements => extract_requirements(flow, ctx).await,
        WorkflowNode::CheckDescription => Ok(check_specificity(flow, ctx).await),
        WorkflowNode::GenerateExperience => {
            generate_section(SectionKind::Experience, flow, ctx).await
        }
        WorkflowNode::GenerateSkills => generate_section(SectionKind::Skills, flow, ctx).await,
        WorkflowNode::GenerateEducation => {
            generate_section(SectionKind::Education, flow, ctx).await
        }
        WorkflowNode::CompileCv => compile_cv(flow, ctx).await,
    }
}
