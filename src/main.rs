//! Message Us - scripted dialogue assistant for the landing page
//!
//! A Rust backend implementing a dialogue state machine that walks
//! visitors through an authored conversation graph.

mod api;
mod config;
mod content;
mod graph;
mod locale;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use content::EmbeddedCatalog;
use runtime::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "message_us=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env();
    tracing::info!(
        port = config.port,
        reply_delay_ms = u64::try_from(config.reply_delay.as_millis()).unwrap_or(u64::MAX),
        default_locale = %config.default_locale,
        content_dir = ?config.content_dir,
        "Configuration loaded"
    );

    // Authored dialogues; an invalid graph stops the server here
    let catalog = match EmbeddedCatalog::load(config.content_dir.as_deref(), config.default_locale) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start with invalid dialogue content");
            return Err(e.into());
        }
    };

    let sessions = Arc::new(SessionManager::new(
        Arc::new(catalog),
        config.session_settings(),
    ));
    sessions.start_reaper();

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(sessions)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(compression),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Message Us server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
