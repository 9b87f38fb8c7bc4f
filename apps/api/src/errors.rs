use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::scoring::pipeline::{PipelineError, Stage, StageFailure};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Malformed or oversized multipart upload.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Error payload shared by every endpoint: `{error, stage?, rawResponse?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl AppError {
    /// Keeps the body limit's 413; every other unreadable body is a 400.
    fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(message)
        } else {
            AppError::Validation(message)
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg,
                    stage: None,
                    raw_response: None,
                },
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    error: msg,
                    stage: None,
                    raw_response: None,
                },
            ),
            AppError::Multipart(err) => (
                err.status(),
                ErrorBody {
                    error: err.body_text(),
                    stage: None,
                    raw_response: None,
                },
            ),
            AppError::Pipeline(err) => {
                let status = match &err.failure {
                    StageFailure::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    StageFailure::Template(_) => {
                        tracing::error!("Prompt template misconfigured: {err}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    StageFailure::Model(e) => {
                        tracing::error!("LLM error in {} stage: {e}", err.stage);
                        StatusCode::BAD_GATEWAY
                    }
                    StageFailure::Response(_) => StatusCode::BAD_GATEWAY,
                    StageFailure::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                };
                let message = match &err.failure {
                    // Provider details (status bodies, key hints) stay in the logs.
                    StageFailure::Model(_) => "The language model could not be reached".to_string(),
                    StageFailure::Template(_) => "An internal server error occurred".to_string(),
                    failure => failure.to_string(),
                };
                (
                    status,
                    ErrorBody {
                        error: message,
                        stage: Some(err.stage),
                        raw_response: err.raw_response().map(str::to_owned),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
