use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::PlayerIdQuery,
        selection::{SelectionResponse, SelectionStateResponse, SubmitSelectionRequest},
    },
    error::AppError,
    services::selection_service,
    state::SharedState,
};

/// Routes handling the character selection phase.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}/selection", post(submit_selection))
        .route("/matches/{id}/selection", get(get_selection))
}

/// Submit, and optionally confirm, a character pick.
#[utoipa::path(
    post,
    path = "/matches/{id}/selection",
    tag = "selection",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitSelectionRequest,
    responses(
        (status = 200, description = "Selection recorded; readiness state returned", body = SelectionResponse)
    )
)]
pub async fn submit_selection(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitSelectionRequest>>,
) -> Result<Json<SelectionResponse>, AppError> {
    let response =
        selection_service::submit_selection(&state, id, payload, SystemTime::now()).await?;
    Ok(Json(response))
}

/// Read the selection state from the requester's perspective.
#[utoipa::path(
    get,
    path = "/matches/{id}/selection",
    tag = "selection",
    params(
        ("id" = Uuid, Path, description = "Match identifier"),
        PlayerIdQuery
    ),
    responses(
        (status = 200, description = "Current selection state", body = SelectionStateResponse)
    )
)]
pub async fn get_selection(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Query(query)): Valid<Query<PlayerIdQuery>>,
) -> Result<Json<SelectionStateResponse>, AppError> {
    let response =
        selection_service::selection_state(&state, id, &query.player_id, SystemTime::now())
            .await?;
    Ok(Json(response))
}
