//! # Blueprint HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /versions` - Supported definitions versions
//! - `POST /validate` - Validate a blueprint
//! - `POST /evaluate` - Evaluate intrinsic functions in a payload
//!
//! ## Configuration (Environment Variables)
//!
//! - `BLUEPRINT_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

pub use handlers::{evaluate_handler, health_handler, validate_handler, versions_handler};
pub use types::{
    ErrorBody, EvaluateRequest, EvaluateResponse, HealthResponse, ValidateResponse, VersionInfo,
    VersionsResponse,
};

use crate::config::{AppConfig, CORS_ORIGINS_ENV, read_non_empty_env};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use blueprint_core::BlueprintError;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `BLUEPRINT_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset: localhost only
/// - otherwise: the comma-separated origins that parse
fn build_cors_layer() -> CorsLayer {
    match read_non_empty_env(CORS_ORIGINS_ENV).as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins ({}=*)", CORS_ORIGINS_ENV);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in {}, defaulting to localhost only",
                    CORS_ORIGINS_ENV
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No {} set, defaulting to localhost only", CORS_ORIGINS_ENV);
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Layers (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit;

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/versions", get(handlers::versions_handler))
        .route("/validate", post(handlers::validate_handler))
        .route("/evaluate", post(handlers::evaluate_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(config: AppConfig) -> Result<(), BlueprintError> {
    let addr = config.bind_address();
    let router = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BlueprintError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Blueprint HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .map_err(|e| BlueprintError::IoError(format!("Server error: {}", e)))
}
