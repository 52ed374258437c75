//! Establishment Dataset Ingestion Server - Main Application Entry Point
//!
//! REST API that receives large tabular datasets (medication inventory, SIAF
//! service usage) from independent health establishments, replacing each
//! establishment's prior dataset through a batched upload protocol, and
//! manages the API keys / session tokens that authorize those uploads.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: SHA-256-hashed API keys exchanged for HS256 session tokens
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration from environment variables
//! 2. Create database connection pool (with startup retries)
//! 3. Run database migrations
//! 4. Spawn the API key renewal scheduler
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment
    // variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration; a missing DATABASE_URL or JWT_SECRET aborts here
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let max_body_bytes = config.max_body_bytes;
    let server_port = config.server_port;
    let state = AppState::new(pool.clone(), config);

    // Spawn the key renewal scheduler as a singleton background task,
    // independent of request traffic
    tokio::spawn(services::renewal::run(pool, Arc::clone(&state.config)));

    // Ingestion routes require a valid session token
    let ingest_routes = Router::new()
        .route("/api/medications", post(handlers::ingest::receive_medications))
        .route("/api/services", post(handlers::ingest::receive_services))
        // Apply session authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let app = Router::new()
        // Public routes (no session token required)
        .route("/health", get(handlers::health::health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route("/api/keys/request", post(handlers::api_keys::request_api_key))
        .route("/api/keys/renew", post(handlers::api_keys::renew_api_key))
        // Merge session-protected routes
        .merge(ingest_routes)
        // Batches are large; raise the JSON body cap accordingly
        .layer(DefaultBodyLimit::max(max_body_bytes))
        // Add request tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{server_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");

    // Serve HTTP requests concurrently with tokio; blocks forever
    axum::serve(listener, app).await?;

    Ok(())
}
