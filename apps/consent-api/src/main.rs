//! Consent API Server - e-signature glue for consent documents
//!
//! Provides REST endpoints for:
//! - Sending a consent PDF (uploaded or generated from text) for signature
//! - Polling envelope status and fetching the signed PDF on completion
//! - Downloading the signed document

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod extract;
mod handlers;
mod models;
mod repository;
mod service;
mod state;
mod storage;

use config::Config;
use state::AppState;

/// Build the API router
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Consent endpoints
        .route("/api/consents/send", post(handlers::send_consent))
        .route(
            "/api/consents/:document_id/status",
            get(handlers::consent_status),
        )
        .route(
            "/api/consents/:document_id/download",
            get(handlers::download_consent),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::parse();

    let default_filter = if config.verbose {
        "consent_api=debug,esign_client=debug,tower_http=debug"
    } else {
        "consent_api=info,esign_client=info,tower_http=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Initializing Consent API...");
    config.log_summary();

    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting Consent API on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
