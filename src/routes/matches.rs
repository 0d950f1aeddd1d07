use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::MatchSummary,
        matches::{CreateMatchRequest, ForfeitRequest, ForfeitResponse, JoinMatchRequest},
    },
    error::AppError,
    services::{match_service, resolution_service},
    state::SharedState,
};

/// Routes handling match bootstrap and terminal actions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", post(create_match))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/join", post(join_match))
        .route("/matches/{id}/forfeit", post(forfeit_match))
}

/// Open a fresh match on behalf of the room collaborator.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match created", body = MatchSummary)
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::create_match(&state, payload, SystemTime::now()).await?;
    Ok(Json(summary))
}

/// Read the authoritative match projection.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Current match state", body = MatchSummary)
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::get_match(&state, id, SystemTime::now()).await?;
    Ok(Json(summary))
}

/// Claim the open slot of a waiting match.
#[utoipa::path(
    post,
    path = "/matches/{id}/join",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = JoinMatchRequest,
    responses(
        (status = 200, description = "Joined; match moved to character selection", body = MatchSummary)
    )
)]
pub async fn join_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary =
        match_service::join_match(&state, id, payload.player_id, SystemTime::now()).await?;
    Ok(Json(summary))
}

/// Surrender the match with a signed proof.
#[utoipa::path(
    post,
    path = "/matches/{id}/forfeit",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = ForfeitRequest,
    responses(
        (status = 200, description = "Match completed by forfeit", body = ForfeitResponse)
    )
)]
pub async fn forfeit_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ForfeitRequest>>,
) -> Result<Json<ForfeitResponse>, AppError> {
    let response = resolution_service::forfeit(&state, id, payload, SystemTime::now()).await?;
    Ok(Json(response))
}
