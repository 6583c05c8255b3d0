//! HTTP handlers for payout-service.

pub mod leaderboard;
pub mod paypal;
pub mod payouts;
pub mod rewards;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::WorkspaceContext;
use crate::models::Program;
use crate::services::get_metrics;
use crate::startup::AppState;

/// Liveness probe; reports the store as well.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "payout-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "payout-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready" })),
            )
        }
    }
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Loads a program of the caller's workspace. Programs of other workspaces are
/// reported as missing.
pub(crate) async fn owned_program(
    state: &AppState,
    ctx: &WorkspaceContext,
    program_id: Uuid,
) -> Result<Program, AppError> {
    state
        .store
        .get_program(program_id)
        .await?
        .filter(|p| p.workspace_id == ctx.workspace_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Program not found")))
}
