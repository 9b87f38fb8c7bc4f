//! Axum route handlers for the Scoring API.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::scoring::engine::JobPosting;
use crate::scoring::pipeline::ScoreRequest;
use crate::scoring::schema::ScoringReport;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTextRequest {
    pub job_title: String,
    pub job_description: String,
    pub resume_text: String,
    #[serde(default)]
    pub additional_instructions: Option<String>,
}

/// Fields collected from the multipart form, in whatever order they arrive.
#[derive(Debug, Default)]
struct ScoreForm {
    job_title: Option<String>,
    job_description: Option<String>,
    additional_instructions: Option<String>,
    resume_file: Option<Bytes>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/score
///
/// Multipart form: `jobTitle`, `jobDescription`, `resumeFile` (PDF) and an
/// optional `additionalInstructions`.
pub async fn handle_score_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ScoringReport>, AppError> {
    let mut multipart = multipart?;
    let mut form = ScoreForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "jobTitle" => form.job_title = Some(field.text().await?),
            "jobDescription" => form.job_description = Some(field.text().await?),
            "additionalInstructions" => form.additional_instructions = Some(field.text().await?),
            "resumeFile" => {
                let bytes = field.bytes().await?;
                info!("Received resume upload ({} bytes)", bytes.len());
                form.resume_file = Some(bytes);
            }
            _ => warn!("Ignoring unknown multipart field: {name}"),
        }
    }

    let request = score_request(
        form.job_title,
        form.job_description,
        form.additional_instructions,
    )?;
    let document = form
        .resume_file
        .ok_or_else(|| AppError::Validation("resumeFile is required".to_string()))?;

    let report = state.pipeline.run_document(&request, document).await?;
    Ok(Json(report))
}

/// POST /api/v1/score/text
///
/// Same pipeline for callers that already hold the resume as plain text.
pub async fn handle_score_text(
    State(state): State<AppState>,
    payload: Result<Json<ScoreTextRequest>, JsonRejection>,
) -> Result<Json<ScoringReport>, AppError> {
    let Json(body) = payload?;
    let request = score_request(
        Some(body.job_title),
        Some(body.job_description),
        body.additional_instructions,
    )?;

    let report = state.pipeline.run(&request, &body.resume_text).await?;
    Ok(Json(report))
}

fn score_request(
    job_title: Option<String>,
    job_description: Option<String>,
    additional_instructions: Option<String>,
) -> Result<ScoreRequest, AppError> {
    let title = required("jobTitle", job_title)?;
    let description = required("jobDescription", job_description)?;

    Ok(ScoreRequest {
        job: JobPosting { title, description },
        additional_instructions: additional_instructions.filter(|s| !s.trim().is_empty()),
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} cannot be empty"))),
    }
}
