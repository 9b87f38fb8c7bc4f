mod config;
mod errors;
mod llm_client;
mod pdf;
mod routes;
mod scoring;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{LlmClient, RetryPolicy};
use crate::routes::build_router;
use crate::scoring::pipeline::{PipelineSettings, ScoringPipeline};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing credential or malformed value)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scorer API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let retry = RetryPolicy {
        max_attempts: config.llm_max_retries,
        ..RetryPolicy::default()
    };
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
        retry,
        config.llm_max_concurrency,
    )?;
    info!(
        "LLM client initialized (model: {}, max concurrency: {})",
        llm.model(),
        config.llm_max_concurrency
    );

    let pipeline = ScoringPipeline::new(
        Arc::new(llm),
        PipelineSettings {
            extraction_temperature: config.extraction_temperature,
            scoring_temperature: config.scoring_temperature,
            request_timeout: config.request_timeout,
        },
    );

    // Build router
    let app = build_router(AppState { pipeline })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
