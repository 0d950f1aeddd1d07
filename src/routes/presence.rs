use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::presence::{PresenceRequest, ReconnectSnapshot},
    error::AppError,
    services::presence_service,
    state::SharedState,
};

/// Routes handling presence transitions and reconnect recovery.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}/disconnect", post(disconnect))
        .route("/matches/{id}/reconnect", post(reconnect))
}

/// Record a best-effort disconnect (e.g. a page-unload beacon).
#[utoipa::path(
    post,
    path = "/matches/{id}/disconnect",
    tag = "presence",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = PresenceRequest,
    responses(
        (status = 200, description = "Presence recorded")
    )
)]
pub async fn disconnect(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PresenceRequest>>,
) -> Result<(), AppError> {
    presence_service::record_disconnect(&state, id, &payload.player_id, SystemTime::now())
        .await?;
    Ok(())
}

/// Mark a participant reconnected and return the full state snapshot used
/// to resynchronize after any gap in event delivery.
#[utoipa::path(
    post,
    path = "/matches/{id}/reconnect",
    tag = "presence",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = PresenceRequest,
    responses(
        (status = 200, description = "Authoritative state snapshot", body = ReconnectSnapshot)
    )
)]
pub async fn reconnect(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PresenceRequest>>,
) -> Result<Json<ReconnectSnapshot>, AppError> {
    let snapshot =
        presence_service::record_reconnect(&state, id, &payload.player_id, SystemTime::now())
            .await?;
    Ok(Json(snapshot))
}
