use crate::scoring::pipeline::ScoringPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the model gateway; cloning shares it across requests.
    pub pipeline: ScoringPipeline,
}
