//! The API proxy: the three gateways exposed as HTTP routes for the browser
//! form.

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::{JobStatusGateway, SummarizationGateway, VideoGenerationGateway};

pub mod routes;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<SummarizationGateway>,
    pub generator: Arc<VideoGenerationGateway>,
    pub status: Arc<JobStatusGateway>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            summarizer: Arc::new(SummarizationGateway::new(&config.summarization)),
            generator: Arc::new(VideoGenerationGateway::new(&config.video)),
            status: Arc::new(JobStatusGateway::new(&config.video)),
        }
    }
}

/// Build the proxy router
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/summarize", post(routes::summarize))
        .route("/api/generate-heygen-video", post(routes::generate_video))
        .route("/api/heygen-video-status", get(routes::video_status))
        .route("/api/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Run the proxy until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config);

    if !state.summarizer.is_configured() {
        tracing::warn!(
            "{} not set; /api/summarize will answer with a configuration error",
            crate::config::OPENAI_KEY_VAR
        );
    }
    if !state.generator.is_configured() {
        tracing::warn!(
            "{} not set; video routes will answer with a configuration error",
            crate::config::HEYGEN_KEY_VAR
        );
    }

    let app = router(state, &config.server.cors_origins);
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
