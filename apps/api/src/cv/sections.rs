//! Section Generators — experience, skills, and education.
//!
//! Each stage makes exactly one LLM call and stores the reply verbatim. An aborted
//! flow is passed through untouched apart from a trace entry. Transport failures
//! are fatal for the whole run.

use tracing::info;

use crate::cv::prompts::{
    fill_template, EDUCATION_PROMPT, EDUCATION_PROMPT_DESCRIPTION_ONLY, EDUCATION_SYSTEM,
    EDUCATION_SYSTEM_DESCRIPTION_ONLY, EXPERIENCE_PROMPT, EXPERIENCE_PROMPT_DESCRIPTION_ONLY,
    EXPERIENCE_SYSTEM, EXPERIENCE_SYSTEM_DESCRIPTION_ONLY, SKILLS_PROMPT,
    SKILLS_PROMPT_DESCRIPTION_ONLY, SKILLS_SYSTEM, SKILLS_SYSTEM_DESCRIPTION_ONLY,
};
use crate::cv::requirements::{ExtractedRequirements, RequirementCategory};
use crate::cv::state::{Flow, GenerationState, SectionKind};
use crate::cv::StageContext;
use crate::errors::AppError;
use crate::llm_client::CompletionRequest;

pub async fn generate_section(
    kind: SectionKind,
    flow: Flow,
    ctx: &StageContext<'_>,
) -> Result<Flow, AppError> {
    let mut state = match flow {
        Flow::Continue(state) => state,
        aborted => {
            let message = format!("Skipping {}: generation aborted", kind.as_str());
            return Ok(aborted.record(kind.node(), message));
        }
    };

    let request = build_request(kind, &state, ctx);
    let text = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|e| AppError::llm(&format!("Generating {} section failed", kind.as_str()), e))?;

    info!("Generated {} section ({} chars)", kind.as_str(), text.len());
    state.set_section(kind, text);
    state.record(kind.node(), format!("Generated {} section", kind.as_str()));
    Ok(Flow::Continue(state))
}

fn build_request(kind: SectionKind, state: &GenerationState, ctx: &StageContext<'_>) -> CompletionRequest {
    let empty = ExtractedRequirements::Parsed(Default::default());
    let requirements = state.requirements().unwrap_or(&empty);
    let field = |category| requirements.field(category).joined();

    let job = state.job();
    let skills = field(RequirementCategory::RequiredSkills);
    let level = field(RequirementCategory::ExperienceLevel);
    let responsibilities = field(RequirementCategory::KeyResponsibilities);
    let soft_skills = field(RequirementCategory::SoftSkills);
    let industry = field(RequirementCategory::IndustryKeywords);
    let education = field(RequirementCategory::EducationRequirements);

    match (kind, state.description_only()) {
        (SectionKind::Experience, true) => ctx.request(
            EXPERIENCE_SYSTEM_DESCRIPTION_ONLY,
            fill_template(
                EXPERIENCE_PROMPT_DESCRIPTION_ONLY,
                &[
                    ("description", job.description.as_str()),
                    ("skills", skills.as_str()),
                    ("level", level.as_str()),
                    ("responsibilities", responsibilities.as_str()),
                ],
            ),
        ),
        (SectionKind::Experience, false) => ctx.request(
            EXPERIENCE_SYSTEM,
            fill_template(
                EXPERIENCE_PROMPT,
                &[
                    ("title", job.title_raw.as_str()),
                    ("company", job.company.as_str()),
                    ("skills", skills.as_str()),
                    ("level", level.as_str()),
                    ("responsibilities", responsibilities.as_str()),
                ],
            ),
        ),
        (SectionKind::Skills, true) => ctx.request(
            SKILLS_SYSTEM_DESCRIPTION_ONLY,
            fill_template(
                SKILLS_PROMPT_DESCRIPTION_ONLY,
                &[
                    ("description", job.description.as_str()),
                    ("tech_skills", skills.as_str()),
                    ("soft_skills", soft_skills.as_str()),
                    ("industry", industry.as_str()),
                ],
            ),
        ),
        (SectionKind::Skills, false) => ctx.request(
            SKILLS_SYSTEM,
            fill_template(
                SKILLS_PROMPT,
                &[
                    ("title", job.title_raw.as_str()),
                    ("company", job.company.as_str()),
                    ("job_category", job.job_category.as_str()),
                    ("description", job.description.as_str()),
                    ("tech_skills", skills.as_str()),
                    ("soft_skills", soft_skills.as_str()),
                    ("industry", industry.as_str()),
                ],
            ),
        ),
        (SectionKind::Education, true) => ctx.request(
            EDUCATION_SYSTEM_DESCRIPTION_ONLY,
            fill_template(
                EDUCATION_PROMPT_DESCRIPTION_ONLY,
                &[
                    ("description", job.description.as_str()),
                    ("education_req", education.as_str()),
                    ("skills", skills.as_str()),
                    ("industry", industry.as_str()),
                ],
            ),
        ),
        (SectionKind::Education, false) => ctx.request(
            EDUCATION_SYSTEM,
            fill_template(
                EDUCATION_PROMPT,
                &[
                    ("title", job.title_raw.as_str()),
                    ("education_req", education.as_str()),
                    ("skills", skills.as_str()),
                    ("industry", industry.as_str()),
                ],
            ),
        ),
    }
}
