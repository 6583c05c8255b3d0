use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::LeaderboardPartner;
use crate::startup::AppState;

/// Public, embeddable ranking; no workspace context required.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(program_id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardPartner>>, AppError> {
    let partners = state.leaderboard.leaderboard(program_id).await?;
    Ok(Json(partners))
}
