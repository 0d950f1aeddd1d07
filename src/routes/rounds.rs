use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::rounds::{
        MoveReceipt, RejectRequest, RejectResponse, RoundOutcomeRequest, RoundOutcomeResponse,
        SubmitMoveRequest, TimeoutClaimRequest, TimeoutClaimResponse,
    },
    error::AppError,
    services::{resolution_service, round_service},
    state::SharedState,
};

/// Routes handling move intake, timeouts, and round outcomes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}/moves", post(submit_move))
        .route(
            "/matches/{id}/rounds/{number}/outcome",
            post(apply_round_outcome),
        )
        .route("/matches/{id}/timeout-claim", post(claim_timeout))
        .route("/matches/{id}/reject", post(reject_move))
}

/// Record a move for the current round.
#[utoipa::path(
    post,
    path = "/matches/{id}/moves",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitMoveRequest,
    responses(
        (status = 200, description = "Move recorded", body = MoveReceipt)
    )
)]
pub async fn submit_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitMoveRequest>>,
) -> Result<Json<MoveReceipt>, AppError> {
    let receipt = round_service::submit_move(&state, id, payload, SystemTime::now()).await?;
    Ok(Json(receipt))
}

/// Apply a round outcome computed by the external resolution engine.
#[utoipa::path(
    post,
    path = "/matches/{id}/rounds/{number}/outcome",
    tag = "rounds",
    params(
        ("id" = Uuid, Path, description = "Match identifier"),
        ("number" = u32, Path, description = "1-based round number")
    ),
    request_body = RoundOutcomeRequest,
    responses(
        (status = 200, description = "Outcome applied", body = RoundOutcomeResponse)
    )
)]
pub async fn apply_round_outcome(
    State(state): State<SharedState>,
    Path((id, number)): Path<(Uuid, u32)>,
    Valid(Json(payload)): Valid<Json<RoundOutcomeRequest>>,
) -> Result<Json<RoundOutcomeResponse>, AppError> {
    let response =
        round_service::apply_round_outcome(&state, id, number, payload, SystemTime::now())
            .await?;
    Ok(Json(response))
}

/// Claim an expired move deadline.
#[utoipa::path(
    post,
    path = "/matches/{id}/timeout-claim",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = TimeoutClaimRequest,
    responses(
        (status = 200, description = "Claim resolved", body = TimeoutClaimResponse)
    )
)]
pub async fn claim_timeout(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<TimeoutClaimRequest>>,
) -> Result<Json<TimeoutClaimResponse>, AppError> {
    let response =
        resolution_service::claim_timeout(&state, id, &payload.player_id, SystemTime::now())
            .await?;
    Ok(Json(response))
}

/// Decline to submit a move for the current round.
#[utoipa::path(
    post,
    path = "/matches/{id}/reject",
    tag = "rounds",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Decline recorded", body = RejectResponse)
    )
)]
pub async fn reject_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RejectRequest>>,
) -> Result<Json<RejectResponse>, AppError> {
    let response =
        resolution_service::reject(&state, id, &payload.player_id, SystemTime::now()).await?;
    Ok(Json(response))
}
