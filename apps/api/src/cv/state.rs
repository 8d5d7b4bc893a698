//! Generation state threaded through the CV workflow.
//!
//! A state value is created per request, moved through every node in order, and
//! consumed into a `CvOutcome`. Fields are private; only the owning stage in this
//! module tree can write them, and each is written at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cv::gate::GateDecision;
use crate::cv::requirements::ExtractedRequirements;
use crate::models::JobRecord;

/// Output value for a deliberately aborted generation.
pub const ABORTED_CV: &str = "NA";

/// Nodes of the workflow graph, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    ExtractRequirements,
    CheckDescription,
    GenerateExperience,
    GenerateSkills,
    GenerateEducation,
    CompileCv,
}

impl WorkflowNode {
    pub const ENTRY: WorkflowNode = WorkflowNode::ExtractRequirements;

    /// The single outgoing edge. `None` after `CompileCv` (END).
    pub fn next(self) -> Option<WorkflowNode> {
        match self {
            WorkflowNode::ExtractRequirements => Some(WorkflowNode::CheckDescription),
            WorkflowNode::CheckDescription => Some(WorkflowNode::GenerateExperience),
            WorkflowNode::GenerateExperience => Some(WorkflowNode::GenerateSkills),
            WorkflowNode::GenerateSkills => Some(WorkflowNode::GenerateEducation),
            WorkflowNode::GenerateEducation => Some(WorkflowNode::CompileCv),
            WorkflowNode::CompileCv => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowNode::ExtractRequirements => "extract_requirements",
            WorkflowNode::CheckDescription => "check_description",
            WorkflowNode::GenerateExperience => "generate_experience",
            WorkflowNode::GenerateSkills => "generate_skills",
            WorkflowNode::GenerateEducation => "generate_education",
            WorkflowNode::CompileCv => "compile_cv",
        }
    }
}

/// One human-readable trace line. Not consumed by any stage.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub node: WorkflowNode,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Experience,
    Skills,
    Education,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Experience => "experience",
            SectionKind::Skills => "skills",
            SectionKind::Education => "education",
        }
    }

    pub fn node(self) -> WorkflowNode {
        match self {
            SectionKind::Experience => WorkflowNode::GenerateExperience,
            SectionKind::Skills => WorkflowNode::GenerateSkills,
            SectionKind::Education => WorkflowNode::GenerateEducation,
        }
    }
}

/// Generated CV sections. Serializes as a map holding only the sections that were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CvSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    education: Option<String>,
}

impl CvSections {
    pub fn get(&self, kind: SectionKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    pub fn len(&self) -> usize {
        [&self.experience, &self.skills, &self.education]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, kind: SectionKind) -> &Option<String> {
        match kind {
            SectionKind::Experience => &self.experience,
            SectionKind::Skills => &self.skills,
            SectionKind::Education => &self.education,
        }
    }

    fn slot_mut(&mut self, kind: SectionKind) -> &mut Option<String> {
        match kind {
            SectionKind::Experience => &mut self.experience,
            SectionKind::Skills => &mut self.skills,
            SectionKind::Education => &mut self.education,
        }
    }
}

/// The record every node reads from and writes to.
#[derive(Debug, Clone)]
pub struct GenerationState {
    job: Arc<JobRecord>,
    description_only: bool,
    requirements: Option<ExtractedRequirements>,
    gate: Option<GateDecision>,
    sections: CvSections,
    final_cv: Option<String>,
    trace: Vec<TraceEntry>,
}

impl GenerationState {
    pub fn new(job: Arc<JobRecord>, description_only: bool) -> Self {
        Self {
            job,
            description_only,
            requirements: None,
            gate: None,
            sections: CvSections::default(),
            final_cv: None,
            trace: Vec::new(),
        }
    }

    pub fn job(&self) -> &JobRecord {
        &self.job
    }

    pub fn description_only(&self) -> bool {
        self.description_only
    }

    pub fn requirements(&self) -> Option<&ExtractedRequirements> {
        self.requirements.as_ref()
    }

    pub fn gate(&self) -> Option<&GateDecision> {
        self.gate.as_ref()
    }

    pub fn sections(&self) -> &CvSections {
        &self.sections
    }

    pub fn final_cv(&self) -> Option<&str> {
        self.final_cv.as_deref()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub(super) fn set_requirements(&mut self, requirements: ExtractedRequirements) {
        debug_assert!(self.requirements.is_none(), "requirements written twice");
        self.requirements = Some(requirements);
    }

    pub(super) fn set_gate(&mut self, decision: GateDecision) {
        debug_assert!(self.gate.is_none(), "gate decision written twice");
        self.gate = Some(decision);
    }

    pub(super) fn set_section(&mut self, kind: SectionKind, text: String) {
        let slot = self.sections.slot_mut(kind);
        debug_assert!(slot.is_none(), "section {} written twice", kind.as_str());
        *slot = Some(text);
    }

    pub(super) fn set_final_cv(&mut self, text: String) {
        debug_assert!(self.final_cv.is_none(), "final CV written twice");
        self.final_cv = Some(text);
    }

    pub(super) fn record(&mut self, node: WorkflowNode, message: impl Into<String>) {
        self.trace.push(TraceEntry {
            node,
            message: message.into(),
            at: Utc::now(),
        });
    }
}

/// A state in flight between nodes.
///
/// `Aborted` is only produced by the specificity gate. No stage turns an aborted
/// flow back into `Continue`.
#[derive(Debug, Clone)]
pub enum Flow {
    Continue(GenerationState),
    Aborted {
        state: GenerationState,
        reason: String,
    },
}

impl Flow {
    pub fn state(&self) -> &GenerationState {
        match self {
            Flow::Continue(state) | Flow::Aborted { state, .. } => state,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Flow::Aborted { .. })
    }

    /// Appends a trace entry regardless of variant.
    pub(super) fn record(mut self, node: WorkflowNode, message: impl Into<String>) -> Self {
        match &mut self {
            Flow::Continue(state) | Flow::Aborted { state, .. } => state.record(node, message),
        }
        self
    }
}

/// What the caller reads once the workflow reaches END.
#[derive(Debug, Clone, Serialize)]
pub struct CvOutcome {
    pub final_cv: String,
    pub aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub extracted_requirements: Option<ExtractedRequirements>,
    pub cv_sections: CvSections,
    pub gate: Option<GateDecision>,
    pub trace: Vec<TraceEntry>,
    pub original_job_data: JobRecord,
}

impl From<Flow> for CvOutcome {
    fn from(flow: Flow) -> Self {
        let (state, abort_reason) = match flow {
            Flow::Continue(state) => (state, None),
            Flow::Aborted { state, reason } => (state, Some(reason)),
        };
        let aborted = abort_reason.is_some();
        let final_cv = state.final_cv.unwrap_or_else(|| {
            if aborted {
                ABORTED_CV.to_string()
            } else {
                String::new()
            }
        });

        CvOutcome {
            final_cv,
            aborted,
            abort_reason,
            extracted_requirements: state.requirements,
            cv_sections: state.sections,
            gate: state.gate,
            trace: state.trace,
            original_job_data: Arc::unwrap_or_clone(state.job),
        }
    }
}
