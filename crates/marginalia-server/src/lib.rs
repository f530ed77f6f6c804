//! Marginalia Server
//!
//! Fetches books from a remote library and analyzes them with an LLM in
//! background tasks, exposing submission, status polling and SSE progress
//! streams over HTTP.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod orchestrator;
pub mod store;
pub mod stream;

use config::ServerConfig;
use handlers::{create_router, AppState};
use marginalia_extractor::{AnalysisPipeline, Extractor};
use marginalia_llm::{LlmError, LlmProvider, OpenAiProvider};
use marginalia_source::{ContentSource, GutenbergSource, SourceError};
use orchestrator::TaskOrchestrator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Content source could not be created
    #[error("Content source error: {0}")]
    Source(#[from] SourceError),

    /// Model provider could not be created
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build the orchestrator and its collaborators from configuration
///
/// The model API key is read from the environment variable named by
/// `llm.api_key_env`.
pub fn build_orchestrator(config: &ServerConfig) -> Result<Arc<TaskOrchestrator>, ServerError> {
    config.validate()?;

    let api_key = std::env::var(&config.llm.api_key_env).ok();
    if api_key.is_none() {
        warn!(
            "{} is not set; model requests will be sent without credentials",
            config.llm.api_key_env
        );
    }

    let source: Arc<dyn ContentSource> = Arc::new(GutenbergSource::new(config.gutenberg())?);
    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(config.openai(api_key))?);
    info!("Using model {}", llm.model_name());

    let pipeline = AnalysisPipeline::new(Extractor::new(llm, config.extractor.clone()));
    Ok(TaskOrchestrator::new(source, pipeline, config.orchestrator()))
}

/// Start the HTTP server
///
/// Serves until Ctrl-C, then cancels open update streams and drains
/// in-flight requests.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Marginalia server");
    info!("Bind address: {}", config.bind_addr());
    info!("Content source: {}", config.source.base_url);
    info!("Analysis mode: {:?}", config.tasks.analysis_mode);

    let state = AppState {
        orchestrator: build_orchestrator(&config)?,
        shutdown: CancellationToken::new(),
    };
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_orchestrator_from_defaults() {
        let orchestrator = build_orchestrator(&ServerConfig::default()).unwrap();
        assert_eq!(orchestrator.active_tasks().active_task_count, 0);
    }

    #[test]
    fn test_build_orchestrator_rejects_invalid_config() {
        let mut config = ServerConfig::default();
        config.tasks.stream_poll_ms = 0;
        assert!(matches!(
            build_orchestrator(&config),
            Err(ServerError::Config(_))
        ));
    }
}
