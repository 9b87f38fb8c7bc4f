//! Scoring pipeline: sequences the stages for one request.
//!
//! Flow: document → text (extraction) → structured resume (stage1) →
//!       raw scoring reply (stage2) → validated report (parse).
//!
//! Each arrow may fail. The first failure ends the run and comes back tagged with
//! the stage it happened in. Nothing here retries; transport retries live in the
//! gateway. The whole run, PDF extraction included, shares one deadline, so a slow
//! stage also cancels every later one. Success is all-or-nothing.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::{LlmError, ModelGateway};
use crate::pdf;
use crate::scoring::engine::{score_resume, JobPosting, Stage2Error};
use crate::scoring::extractor::{extract_structured, ExtractionError, Stage1Error};
use crate::scoring::parser::{parse_report, ResponseError};
use crate::scoring::prompts::TemplateError;
use crate::scoring::schema::ScoringReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extraction,
    Stage1,
    Stage2,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extraction => "extraction",
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Parse => "parse",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("prompt assembly failed: {0}")]
    Template(#[from] TemplateError),

    #[error("model invocation failed: {0}")]
    Model(#[from] LlmError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("request deadline of {0:?} exceeded")]
    TimedOut(Duration),
}

/// A failed run: which stage broke, and how.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {failure}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub failure: StageFailure,
}

impl PipelineError {
    fn new(stage: Stage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    /// The model's untouched reply, when the failure came from reading it.
    pub fn raw_response(&self) -> Option<&str> {
        match &self.failure {
            StageFailure::Response(e) => Some(e.raw()),
            _ => None,
        }
    }
}

impl From<Stage1Error> for PipelineError {
    fn from(err: Stage1Error) -> Self {
        match err {
            Stage1Error::Extraction(e) => PipelineError::new(Stage::Extraction, e),
            Stage1Error::Template(e) => PipelineError::new(Stage::Stage1, e),
            Stage1Error::Model(e) => PipelineError::new(Stage::Stage1, e),
            Stage1Error::Response(e) => PipelineError::new(Stage::Stage1, e),
        }
    }
}

impl From<Stage2Error> for PipelineError {
    fn from(err: Stage2Error) -> Self {
        match err {
            Stage2Error::Template(e) => PipelineError::new(Stage::Stage2, e),
            Stage2Error::Model(e) => PipelineError::new(Stage::Stage2, e),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub extraction_temperature: f32,
    pub scoring_temperature: f32,
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extraction_temperature: 0.0,
            scoring_temperature: 0.0,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything one scoring request needs besides the resume itself.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub job: JobPosting,
    pub additional_instructions: Option<String>,
}

/// Holds the shared gateway; every `run` is independent of every other.
#[derive(Clone)]
pub struct ScoringPipeline {
    gateway: Arc<dyn ModelGateway>,
    settings: PipelineSettings,
}

impl ScoringPipeline {
    pub fn new(gateway: Arc<dyn ModelGateway>, settings: PipelineSettings) -> Self {
        Self { gateway, settings }
    }

    /// Full run from an uploaded PDF. Text extraction counts against the deadline.
    pub async fn run_document(
        &self,
        request: &ScoreRequest,
        document: bytes::Bytes,
    ) -> Result<ScoringReport, PipelineError> {
        let run = self.begin(request);
        let text = self
            .bounded(&run, Stage::Extraction, pdf::extract_text(document))
            .await?
            .map_err(|e| log_failure(run.id, PipelineError::new(Stage::Extraction, e)))?;
        self.score_text(request, &text, &run).await
    }

    /// Run from already-extracted text.
    pub async fn run(
        &self,
        request: &ScoreRequest,
        resume_text: &str,
    ) -> Result<ScoringReport, PipelineError> {
        let run = self.begin(request);
        self.score_text(request, resume_text, &run).await
    }

    fn begin(&self, request: &ScoreRequest) -> RunClock {
        let started = Instant::now();
        let run = RunClock {
            id: Uuid::new_v4(),
            started,
            deadline: started + self.settings.request_timeout,
        };
        info!(request_id = %run.id, job_title = %request.job.title, "Scoring request started");
        run
    }

    /// Awaits one stage, giving up once the run's deadline has passed.
    async fn bounded<F: Future>(
        &self,
        run: &RunClock,
        stage: Stage,
        work: F,
    ) -> Result<F::Output, PipelineError> {
        timeout_at(run.deadline, work).await.map_err(|_| {
            warn!(request_id = %run.id, %stage, "Scoring request exceeded its deadline");
            PipelineError::new(stage, StageFailure::TimedOut(self.settings.request_timeout))
        })
    }

    async fn score_text(
        &self,
        request: &ScoreRequest,
        resume_text: &str,
        run: &RunClock,
    ) -> Result<ScoringReport, PipelineError> {
        let request_id = run.id;

        let structured = self
            .bounded(
                run,
                Stage::Stage1,
                extract_structured(
                    self.gateway.as_ref(),
                    resume_text,
                    self.settings.extraction_temperature,
                ),
            )
            .await?
            .map_err(|e| log_failure(request_id, e.into()))?;
        info!(%request_id, elapsed_ms = run.elapsed_ms(), "Stage 1 complete");

        let raw = self
            .bounded(
                run,
                Stage::Stage2,
                score_resume(
                    self.gateway.as_ref(),
                    &request.job,
                    &structured,
                    request.additional_instructions.as_deref(),
                    self.settings.scoring_temperature,
                ),
            )
            .await?
            .map_err(|e| log_failure(request_id, e.into()))?;
        info!(%request_id, elapsed_ms = run.elapsed_ms(), "Stage 2 complete");

        let report = parse_report(&raw)
            .map_err(|e| log_failure(request_id, PipelineError::new(Stage::Parse, e)))?;
        info!(
            %request_id,
            overall_score = report.overall_score,
            ats_score = report.ats_compatibility_score,
            elapsed_ms = run.elapsed_ms(),
            "Scoring request complete"
        );

        Ok(report)
    }
}

/// Identity and timing of one pipeline run.
struct RunClock {
    id: Uuid,
    started: Instant,
    deadline: Instant,
}

impl RunClock {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

fn log_failure(request_id: Uuid, err: PipelineError) -> PipelineError {
    warn!(%request_id, stage = %err.stage, "Scoring request failed: {}", err.failure);
    err
}
