//! Stage 2: asks the model to score a structured resume against a job posting.
//!
//! The engine computes nothing itself. It guarantees the prompt carries the full
//! report schema and the no-preamble rule, then hands back the raw reply untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::prompts::{EVALUATOR_SYSTEM, NO_PREAMBLE_INSTRUCTION};
use crate::llm_client::{CompletionRequest, LlmError, ModelGateway};
use crate::scoring::extractor::StructuredResume;
use crate::scoring::prompts::{additional_instructions_block, TemplateError, SCORING_PROMPT};
use crate::scoring::schema::render_schema;

/// The target role. Immutable for the lifetime of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum Stage2Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Builds the scoring prompt. Split out so prompt contents are testable without a model.
pub fn build_scoring_prompt(
    job: &JobPosting,
    resume: &StructuredResume,
    additional_instructions: Option<&str>,
) -> Result<String, TemplateError> {
    let resume_json = resume.to_prompt_json();
    let instructions = additional_instructions_block(additional_instructions);
    let schema = render_schema();

    SCORING_PROMPT.build(&[
        ("job_title", job.title.trim()),
        ("job_description", job.description.trim()),
        ("structured_resume", resume_json.as_str()),
        ("additional_instructions", instructions.as_str()),
        ("schema", schema.as_str()),
        ("no_preamble", NO_PREAMBLE_INSTRUCTION),
    ])
}

/// Runs stage 2 and returns the model's raw reply.
pub async fn score_resume(
    gateway: &dyn ModelGateway,
    job: &JobPosting,
    resume: &StructuredResume,
    additional_instructions: Option<&str>,
    temperature: f32,
) -> Result<String, Stage2Error> {
    let prompt = build_scoring_prompt(job, resume, additional_instructions)?;

    let raw = gateway
        .invoke(CompletionRequest {
            system: Some(EVALUATOR_SYSTEM),
            prompt: &prompt,
            temperature,
        })
        .await?;
    debug!("Stage 2 returned {} bytes", raw.len());

    Ok(raw)
}
