//! Compiler — merges the three sections into one document, or emits `"NA"` when aborted.

use tracing::info;

use crate::cv::prompts::{
    fill_template, COMPILE_PROMPT, COMPILE_PROMPT_DESCRIPTION_ONLY, COMPILE_SYSTEM,
    COMPILE_SYSTEM_DESCRIPTION_ONLY,
};
use crate::cv::state::{Flow, SectionKind, WorkflowNode, ABORTED_CV};
use crate::cv::StageContext;
use crate::errors::AppError;

const NODE: WorkflowNode = WorkflowNode::CompileCv;

pub async fn compile_cv(flow: Flow, ctx: &StageContext<'_>) -> Result<Flow, AppError> {
    let mut state = match flow {
        Flow::Continue(state) => state,
        Flow::Aborted { mut state, reason } => {
            state.set_final_cv(ABORTED_CV.to_string());
            state.record(
                NODE,
                format!("Aborted: description not specific enough ({reason}). Final CV set to NA."),
            );
            return Ok(Flow::Aborted { state, reason });
        }
    };

    let sections = state.sections();
    let experience = sections.get(SectionKind::Experience).unwrap_or_default();
    let skills = sections.get(SectionKind::Skills).unwrap_or_default();
    let education = sections.get(SectionKind::Education).unwrap_or_default();

    let request = if state.description_only() {
        ctx.request(
            COMPILE_SYSTEM_DESCRIPTION_ONLY,
            fill_template(
                COMPILE_PROMPT_DESCRIPTION_ONLY,
                &[
                    ("experience", experience),
                    ("skills", skills),
                    ("education", education),
                ],
            ),
        )
    } else {
        let job = state.job();
        ctx.request(
            COMPILE_SYSTEM,
            fill_template(
                COMPILE_PROMPT,
                &[
                    ("title", job.title_raw.as_str()),
                    ("company", job.company.as_str()),
                    ("experience", experience),
                    ("skills", skills),
                    ("education", education),
                ],
            ),
        )
    };

    let final_cv = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|e| AppError::llm("Compiling the final CV failed", e))?;

    info!("Compiled final CV ({} chars)", final_cv.len());
    state.set_final_cv(final_cv);
    state.record(NODE, "Compiled final CV");
    Ok(Flow::Continue(state))
}
