mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod export;
mod generator;
mod models;
mod routes;
mod sanitize;
mod session;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::export::{ExportCoordinator, RendererClient};
use crate::generator::GeneratorClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgSessionStore, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.rust_log.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumeflow API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL-backed session store
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool));

    // Content Generator webhook client
    let generator = GeneratorClient::new(config.generator_webhook_url.clone());
    info!("Generator client initialized ({})", config.generator_webhook_url);

    // Renderer boundary + export coordinator
    let renderer = RendererClient::new(config.renderer_url.clone());
    let exporter = ExportCoordinator::new(store.clone(), renderer);
    info!("Export coordinator initialized ({})", config.renderer_url);

    // Build app state
    let state = AppState::new(store, generator, exporter, config.clone());

    // Build router; the frontend origin varies by deployment, so CORS stays open
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
