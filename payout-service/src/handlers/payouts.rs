use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::owned_program;
use crate::dtos::{
    ConfirmPayoutsRequest, CountGroupBy, CountResponse, PayoutListQuery, StatusCount,
};
use crate::middleware::WorkspaceContext;
use crate::models::{Invoice, Payout, PayoutFilter, PayoutWithPartner};
use crate::services::ConfirmPayouts;
use crate::startup::AppState;

/// Batch the default program's pending payouts into a charged invoice.
pub async fn confirm_payouts(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Json(req): Json<ConfirmPayoutsRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    req.validate()?;

    if req.workspace_id != ctx.workspace_id {
        return Err(AppError::NotFound(anyhow::anyhow!("Workspace not found")));
    }

    tracing::info!(workspace_id = %req.workspace_id, "Confirming payouts");

    let invoice = state
        .payouts
        .confirm_payouts(ConfirmPayouts {
            workspace_id: req.workspace_id,
            payment_method_id: req.payment_method_id,
            user_id: ctx.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_payouts(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path(program_id): Path<Uuid>,
    Query(query): Query<PayoutListQuery>,
) -> Result<Json<Vec<PayoutWithPartner>>, AppError> {
    let program = owned_program(&state, &ctx, program_id).await?;
    let payouts = state
        .payouts
        .list_payouts(program.id, &PayoutFilter::from(&query))
        .await?;
    Ok(Json(payouts))
}

pub async fn count_payouts(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path(program_id): Path<Uuid>,
    Query(query): Query<PayoutListQuery>,
) -> Result<Response, AppError> {
    let program = owned_program(&state, &ctx, program_id).await?;
    let filter = PayoutFilter::from(&query);

    match query.group_by {
        Some(CountGroupBy::Status) => {
            let counts: Vec<StatusCount> = state
                .payouts
                .count_payouts_by_status(program.id, &filter)
                .await?
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect();
            Ok(Json(counts).into_response())
        }
        None => {
            let count = state.payouts.count_payouts(program.id, &filter).await?;
            Ok(Json(CountResponse { count }).into_response())
        }
    }
}

pub async fn mark_payout_paid(
    State(state): State<AppState>,
    ctx: WorkspaceContext,
    Path((program_id, payout_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Payout>, AppError> {
    let program = owned_program(&state, &ctx, program_id).await?;

    tracing::info!(
        program_id = %program.id,
        payout_id = %payout_id,
        user_id = ?ctx.user_id,
        "Marking payout as paid"
    );

    let payout = state
        .payouts
        .mark_payout_paid(program.id, payout_id, ctx.user_id)
        .await?;
    Ok(Json(payout))
}
