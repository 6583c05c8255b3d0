use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::owned_program;
use crate::dtos::{CreateRewardRequest, UpdateRewardRequest};
use crate::middleware::WorkspaceContext;
use crate::models::Reward;
use crate::startup::AppState;

pub async fn list_rewards(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path(program_id): Path<Uuid>,
) -> Result<Json<Vec<Reward>>, AppError> {
    let program = owned_program(&state, &ctx, program_id).await?;
    Ok(Json(state.rewards.list(&program).await?))
}

pub async fn create_reward(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path(program_id): Path<Uuid>,
    Json(req): Json<CreateRewardRequest>,
) -> Result<(StatusCode, Json<Reward>), AppError> {
    req.validate()?;
    let program = owned_program(&state, &ctx, program_id).await?;
    let reward = state.rewards.create(&program, req).await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn update_reward(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path((program_id, reward_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRewardRequest>,
) -> Result<Json<Reward>, AppError> {
    req.validate()?;
    let program = owned_program(&state, &ctx, program_id).await?;
    let reward = state
        .rewards
        .update(&program, reward_id, req.into())
        .await?;
    Ok(Json(reward))
}

pub async fn delete_reward(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path((program_id, reward_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let program = owned_program(&state, &ctx, program_id).await?;
    state.rewards.delete(&program, reward_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
