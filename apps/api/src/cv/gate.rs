//! Specificity Gate — decides whether the extracted requirements carry enough signal
//! to write a grounded CV. Runs only in description-only mode.
//!
//! Decision order:
//! 1. Fast accept when required skills and responsibilities both reach their thresholds.
//! 2. Otherwise ask a validator model for `{"sufficient": bool, "reason": string}`.
//!    - sufficient → pass
//!    - insufficient, richness ≥ `override_score` → pass
//!    - insufficient otherwise → abort
//! 3. If the validator call or its JSON fails, richness ≥ `fallback_score` passes, else abort.
//!
//! Richness = required_skills + key_responsibilities
//!          + 1 if experience_level is set + 1 if education_requirements is set
//!          + 0.25 × min(soft_skills, cap) + 0.25 × min(industry_keywords, cap)

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cv::prompts::{fill_template, VALIDATOR_PROMPT, VALIDATOR_SYSTEM};
use crate::cv::requirements::{ExtractedRequirements, RequirementCategory};
use crate::cv::state::{Flow, WorkflowNode};
use crate::cv::StageContext;
use crate::llm_client::complete_json;

const NODE: WorkflowNode = WorkflowNode::CheckDescription;

/// Weight of each soft-skill / industry-keyword item in the richness score.
const BONUS_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateThresholds {
    pub fast_accept_skills: usize,
    pub fast_accept_responsibilities: usize,
    /// Richness at which a negative validator verdict is overridden.
    pub override_score: f64,
    /// Richness required to proceed when the validator is unavailable.
    pub fallback_score: f64,
    /// Max soft-skill and industry-keyword items counted toward richness.
    pub bonus_cap: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            fast_accept_skills: 3,
            fast_accept_responsibilities: 3,
            override_score: 5.0,
            fallback_score: 4.0,
            bonus_cap: 3,
        }
    }
}

/// Non-empty item counts and the resulting richness score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Richness {
    pub required_skills: usize,
    pub soft_skills: usize,
    pub key_responsibilities: usize,
    pub industry_keywords: usize,
    pub has_experience_level: bool,
    pub has_education_requirements: bool,
    pub score: f64,
}

impl Richness {
    pub fn assess(requirements: &ExtractedRequirements, thresholds: &GateThresholds) -> Self {
        let count = |category| requirements.field(category).non_empty_count();
        let required_skills = count(RequirementCategory::RequiredSkills);
        let soft_skills = count(RequirementCategory::SoftSkills);
        let key_responsibilities = count(RequirementCategory::KeyResponsibilities);
        let industry_keywords = count(RequirementCategory::IndustryKeywords);
        let has_experience_level = requirements
            .field(RequirementCategory::ExperienceLevel)
            .is_present();
        let has_education_requirements = requirements
            .field(RequirementCategory::EducationRequirements)
            .is_present();

        let score = (required_skills + key_responsibilities) as f64
            + f64::from(u8::from(has_experience_level))
            + f64::from(u8::from(has_education_requirements))
            + BONUS_WEIGHT * soft_skills.min(thresholds.bonus_cap) as f64
            + BONUS_WEIGHT * industry_keywords.min(thresholds.bonus_cap) as f64;

        Self {
            required_skills,
            soft_skills,
            key_responsibilities,
            industry_keywords,
            has_experience_level,
            has_education_requirements,
            score,
        }
    }

    pub fn fast_accept(&self, thresholds: &GateThresholds) -> bool {
        self.required_skills >= thresholds.fast_accept_skills
            && self.key_responsibilities >= thresholds.fast_accept_responsibilities
    }
}

/// Which path the gate took. Exactly one is recorded per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum GateDecision {
    /// Full-job mode: the gate does not apply.
    NotApplicable,
    HeuristicPass { score: f64 },
    ValidatorPass { score: f64, reason: String },
    HeuristicOverride { score: f64, reason: String },
    Insufficient { score: f64, reason: String },
    ValidatorFailedPass { score: f64, error: String },
    ValidatorFailedAbort { score: f64, error: String },
}

impl GateDecision {
    /// The abort reason, if this decision stops generation.
    pub fn abort_reason(&self) -> Option<String> {
        match self {
            GateDecision::Insufficient { reason, .. } if reason.trim().is_empty() => {
                Some("validator judged the requirements insufficient".to_string())
            }
            GateDecision::Insufficient { reason, .. } => Some(reason.clone()),
            GateDecision::ValidatorFailedAbort { score, error } => Some(format!(
                "validator unavailable and richness score {score} is too low ({error})"
            )),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GateDecision::NotApplicable => {
                "Specificity check skipped (description_only=false)".to_string()
            }
            GateDecision::HeuristicPass { .. } => {
                "Specificity check passed via heuristic on extracted requirements.".to_string()
            }
            GateDecision::ValidatorPass { .. } => {
                "Specificity check passed by validator.".to_string()
            }
            GateDecision::HeuristicOverride { score, .. } => format!(
                "Validator said insufficient, but heuristic richness is high (score={score}); proceeding."
            ),
            GateDecision::Insufficient { reason, .. } => {
                format!("Extracted requirements insufficient: {reason}")
            }
            GateDecision::ValidatorFailedPass { score, error } => format!(
                "Validator failed; proceeding based on heuristic (score={score}). Error: {error}"
            ),
            GateDecision::ValidatorFailedAbort { score, error } => format!(
                "Validator failed and heuristic low (score={score}); aborting. Error: {error}"
            ),
        }
    }
}

/// Only `sufficient` decides between a verdict and a validator failure. A null or
/// non-string `reason` is read leniently.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorVerdict {
    #[serde(default)]
    pub sufficient: bool,
    #[serde(default, deserialize_with = "lenient_reason")]
    pub reason: String,
}

fn lenient_reason<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub async fn check_specificity(flow: Flow, ctx: &StageContext<'_>) -> Flow {
    let mut state = match flow {
        Flow::Continue(state) => state,
        aborted => {
            return aborted.record(NODE, "Specificity check skipped: generation already aborted")
        }
    };

    let decision = if state.description_only() {
        let empty = ExtractedRequirements::Parsed(Map::new());
        decide(state.requirements().unwrap_or(&empty), ctx).await
    } else {
        GateDecision::NotApplicable
    };

    let message = decision.message();
    let abort_reason = decision.abort_reason();
    state.set_gate(decision);
    state.record(NODE, message.clone());

    match abort_reason {
        Some(reason) => {
            info!("Generation aborted by specificity gate: {reason}");
            Flow::Aborted { state, reason }
        }
        None => {
            info!("{message}");
            Flow::Continue(state)
        }
    }
}

/// Runs the decision procedure for one requirement record.
pub async fn decide(requirements: &ExtractedRequirements, ctx: &StageContext<'_>) -> GateDecision {
    let thresholds = ctx.gate;
    let richness = Richness::assess(requirements, thresholds);
    let score = richness.score;

    if richness.fast_accept(thresholds) {
        return GateDecision::HeuristicPass { score };
    }

    let request = ctx.validator_request(
        VALIDATOR_SYSTEM,
        fill_template(
            VALIDATOR_PROMPT,
            &[("requirements_json", requirements.to_json().to_string().as_str())],
        ),
    );

    match complete_json::<ValidatorVerdict>(ctx.llm, &request).await {
        Ok(verdict) if verdict.sufficient => GateDecision::ValidatorPass {
            score,
            reason: verdict.reason,
        },
        Ok(verdict) if score >= thresholds.override_score => GateDecision::HeuristicOverride {
            score,
            reason: verdict.reason,
        },
        Ok(verdict) => GateDecision::Insufficient {
            score,
            reason: verdict.reason,
        },
        Err(e) => {
            warn!("Specificity validator failed: {e}; falling back to richness score {score}");
            if score >= thresholds.fallback_score {
                GateDecision::ValidatorFailedPass {
                    score,
                    error: e.to_string(),
                }
            } else {
                GateDecision::ValidatorFailedAbort {
                    score,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CvModelConfig;
    use crate::cv::state::GenerationState;
    use crate::llm_client::testing::{transport_error, ScriptedLlm};
    use crate::llm_client::LlmProvider;
    use crate::models::JobRecord;
    use serde_json::{json, Value};

    fn parsed(value: Value) -> ExtractedRequirements {
        match value {
            Value::Object(map) => ExtractedRequirements::Parsed(map),
            _ => panic!("fixture must be an object"),
        }
    }

    async fn decide_with(
        llm: &dyn LlmProvider,
        requirements: &ExtractedRequirements,
        thresholds: GateThresholds,
    ) -> GateDecision {
        let model = CvModelConfig::default();
        let ctx = StageContext {
            llm,
            model: &model,
            gate: &thresholds,
        };
        decide(requirements, &ctx).await
    }

    #[test]
    fn test_richness_score_formula() {
        let requirements = parsed(json!({
            "required_skills": ["SQL", "Python", " "],
            "key_responsibilities": "Build dashboards",
            "experience_level": "Mid",
            "education_requirements": "",
            "soft_skills": ["a", "b", "c", "d", "e"],
            "industry_keywords": ["retail"]
        }));
        let richness = Richness::assess(&requirements, &GateThresholds::default());
        assert_eq!(richness.required_skills, 2);
        assert_eq!(richness.key_responsibilities, 1);
        assert!(richness.has_experience_level);
        assert!(!richness.has_education_requirements);
        // 2 + 1 + 1 + 0 + 0.25 * 3 + 0.25 * 1
        assert!((richness.score - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fallback_record_has_zero_richness() {
        let job = JobRecord::from_description("Developer");
        let requirements = ExtractedRequirements::Fallback(
            crate::cv::requirements::FallbackRequirements::from_job(&job),
        );
        let richness = Richness::assess(&requirements, &GateThresholds::default());
        assert_eq!(richness.score, 0.0);
    }

    #[tokio::test]
    async fn test_fast_accept_skips_validator() {
        let llm = ScriptedLlm::default();
        let requirements = parsed(json!({
            "required_skills": ["SQL", "Python", "Tableau"],
            "key_responsibilities": ["Report", "Model", "Present"]
        }));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(decision, GateDecision::HeuristicPass { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_requirements_and_negative_verdict_abort() {
        let llm = ScriptedLlm::replying(&[r#"{"sufficient": false, "reason": "too vague"}"#]);
        let requirements = parsed(json!({
            "required_skills": [],
            "soft_skills": [],
            "experience_level": "",
            "education_requirements": "",
            "key_responsibilities": [],
            "industry_keywords": [],
            "company_culture": []
        }));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert_eq!(
            decision,
            GateDecision::Insufficient {
                score: 0.0,
                reason: "too vague".to_string()
            }
        );
        assert_eq!(decision.abort_reason().as_deref(), Some("too vague"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_positive_verdict_passes() {
        let llm = ScriptedLlm::replying(&[r#"{"sufficient": true, "reason": "clear role"}"#]);
        let requirements = parsed(json!({"required_skills": ["SQL"]}));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(decision, GateDecision::ValidatorPass { .. }));
        assert!(decision.abort_reason().is_none());
    }

    #[tokio::test]
    async fn test_rich_record_overrides_negative_verdict() {
        let llm = ScriptedLlm::replying(&[r#"{"sufficient": false, "reason": "meh"}"#]);
        let requirements = parsed(json!({
            "required_skills": ["SQL", "Python"],
            "key_responsibilities": ["Report", "Model"],
            "experience_level": "Senior",
            "education_requirements": "BSc"
        }));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(
            decision,
            GateDecision::HeuristicOverride { score, .. } if (score - 6.0).abs() < f64::EPSILON
        ));
    }

    #[tokio::test]
    async fn test_validator_outage_with_score_four_proceeds() {
        let llm = ScriptedLlm::new(vec![Err(transport_error())]);
        let requirements = parsed(json!({
            "required_skills": ["SQL", "Python"],
            "key_responsibilities": ["Report"],
            "experience_level": "Mid"
        }));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(
            decision,
            GateDecision::ValidatorFailedPass { score, .. } if (score - 4.0).abs() < f64::EPSILON
        ));
    }

    #[tokio::test]
    async fn test_malformed_verdict_with_low_score_aborts() {
        let llm = ScriptedLlm::replying(&["I think it's fine"]);
        let requirements = parsed(json!({
            "required_skills": ["SQL", "Python"],
            "key_responsibilities": ["Report"],
            "soft_skills": ["Teamwork", "Grit", "Focus"]
        }));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(decision, GateDecision::ValidatorFailedAbort { .. }));
        assert!(decision.abort_reason().unwrap().contains("3.75"));
    }

    #[tokio::test]
    async fn test_verdict_without_sufficient_field_counts_as_negative() {
        let llm = ScriptedLlm::replying(&[r#"{"reason": "unclear"}"#]);
        let requirements = parsed(json!({}));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(decision, GateDecision::Insufficient { .. }));
    }

    #[tokio::test]
    async fn test_null_or_numeric_reason_keeps_the_verdict() {
        let requirements = parsed(json!({"required_skills": ["SQL"]}));
        for reply in [
            r#"{"sufficient": true, "reason": null}"#,
            r#"{"sufficient": true, "reason": 42}"#,
        ] {
            let llm = ScriptedLlm::replying(&[reply]);
            let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;
            assert!(
                matches!(decision, GateDecision::ValidatorPass { .. }),
                "{reply} gave {decision:?}"
            );
        }

        let llm = ScriptedLlm::replying(&[r#"{"sufficient": false, "reason": null}"#]);
        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;
        assert_eq!(
            decision.abort_reason().as_deref(),
            Some("validator judged the requirements insufficient")
        );
    }

    #[tokio::test]
    async fn test_string_sufficient_counts_as_validator_failure() {
        let llm = ScriptedLlm::replying(&[r#"{"sufficient": "true", "reason": "ok"}"#]);
        let requirements = parsed(json!({"required_skills": ["SQL"]}));

        let decision = decide_with(&llm, &requirements, GateThresholds::default()).await;

        assert!(matches!(decision, GateDecision::ValidatorFailedAbort { .. }));
    }

    #[tokio::test]
    async fn test_thresholds_are_configurable() {
        let llm = ScriptedLlm::default();
        let requirements = parsed(json!({
            "required_skills": ["SQL"],
            "key_responsibilities": ["Report"]
        }));
        let thresholds = GateThresholds {
            fast_accept_skills: 1,
            fast_accept_responsibilities: 1,
            ..GateThresholds::default()
        };

        let decision = decide_with(&llm, &requirements, thresholds).await;

        assert!(matches!(decision, GateDecision::HeuristicPass { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_validator_request_is_cold_and_carries_the_record() {
        let llm = ScriptedLlm::replying(&[r#"{"sufficient": true, "reason": ""}"#]);
        let requirements = parsed(json!({"required_skills": ["Kubernetes"]}));

        decide_with(&llm, &requirements, GateThresholds::default()).await;

        let requests = llm.requests();
        assert_eq!(requests[0].temperature, 0.0);
        assert!(requests[0].prompt.contains("\"required_skills\":[\"Kubernetes\"]"));
        assert!(requests[0].system.contains("\"sufficient\""));
    }

    #[tokio::test]
    async fn test_full_mode_is_a_pass_through() {
        let llm = ScriptedLlm::default();
        let model = CvModelConfig::default();
        let thresholds = GateThresholds::default();
        let ctx = StageContext {
            llm: &llm,
            model: &model,
            gate: &thresholds,
        };
        let state = GenerationState::new(Arc::new(JobRecord::default()), false);

        let flow = check_specificity(Flow::Continue(state), &ctx).await;

        assert!(!flow.is_aborted());
        assert_eq!(flow.state().gate(), Some(&GateDecision::NotApplicable));
        assert_eq!(flow.state().trace().len(), 1);
        assert_eq!(llm.calls(), 0);
    }
}
