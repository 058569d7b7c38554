//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        EvaluateRequest, EvaluateResponse, HealthResponse, ValidateResponse, VersionsResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use blueprint_core::{Blueprint, Topology, evaluate, validate_blueprint_with};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// VERSIONS HANDLER
// =============================================================================

/// List supported definitions versions and what each enables.
pub async fn versions_handler() -> impl IntoResponse {
    Json(VersionsResponse::supported())
}

// =============================================================================
// VALIDATE HANDLER
// =============================================================================

/// Validate a blueprint.
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(blueprint): Json<Blueprint>,
) -> impl IntoResponse {
    match validate_blueprint_with(&blueprint, state.config.default_version) {
        Ok(result) => {
            tracing::debug!(
                version = %result.version,
                groups = result.groups.len(),
                scaling_groups = result.scaling_groups.len(),
                "blueprint validated"
            );
            (StatusCode::OK, Json(ValidateResponse::success(result)))
        }
        Err(e) => {
            tracing::info!(code = ?e.code(), "blueprint rejected: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidateResponse::error(&e)),
            )
        }
    }
}

// =============================================================================
// EVALUATE HANDLER
// =============================================================================

/// Evaluate every intrinsic function in a payload.
pub async fn evaluate_handler(Json(request): Json<EvaluateRequest>) -> impl IntoResponse {
    let EvaluateRequest {
        mut payload,
        context,
        topology,
    } = request;
    let topology = topology.map(Topology::from_snapshot);

    match evaluate(&mut payload, &context, &topology) {
        Ok(()) => (StatusCode::OK, Json(EvaluateResponse::success(payload))),
        Err(e) => {
            tracing::info!("evaluation failed: {}", e);
            (StatusCode::BAD_REQUEST, Json(EvaluateResponse::error(&e)))
        }
    }
}
