// CV Generation: requirement extraction → specificity gate → section generation → compilation.
// All LLM calls go through the `LlmProvider` handed in by the workflow.

pub mod compiler;
pub mod extractor;
pub mod gate;
pub mod handlers;
pub mod prompts;
pub mod requirements;
pub mod sections;
pub mod state;
pub mod workflow;

use crate::config::CvModelConfig;
use crate::cv::gate::GateThresholds;
use crate::llm_client::{CompletionRequest, LlmProvider};

/// Collaborators and settings every node receives.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub llm: &'a dyn LlmProvider,
    pub model: &'a CvModelConfig,
    pub gate: &'a GateThresholds,
}

impl StageContext<'_> {
    /// Request for a content stage.
    pub fn request(&self, system: &str, prompt: String) -> CompletionRequest {
        CompletionRequest {
            system: system.to_string(),
            prompt,
            model: self.model.model.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
        }
    }

    /// Request for the gate's validator call.
    pub fn validator_request(&self, system: &str, prompt: String) -> CompletionRequest {
        CompletionRequest {
            temperature: self.model.validator_temperature,
            ..self.request(system, prompt)
        }
    }
}
