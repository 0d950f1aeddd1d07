use std::{convert::Infallible, time::SystemTime};

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::Sse,
    routing::get,
};
use axum_valid::Valid;
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::common::StreamIdentityQuery,
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

/// Configure the per-match event stream endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/matches/{id}/events", get(match_events))
}

/// Stream realtime match events to a player or spectator.
#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Match identifier"),
        StreamIdentityQuery
    ),
    responses((status = 200, description = "Match SSE stream", content_type = "text/event-stream", body = String))
)]
pub async fn match_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Query(query)): Valid<Query<StreamIdentityQuery>>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let kind = match query.player_id {
        Some(player_id) => StreamKind::Player { player_id },
        None => StreamKind::Spectator,
    };

    let receiver = sse_service::subscribe(&state, id, &kind, SystemTime::now()).await?;
    info!(match_id = %id, "new match SSE connection");
    let degraded = state.is_degraded().await;
    sse_service::broadcast_stream_connected(&state, id, degraded);

    Ok(sse_service::to_sse_stream(state, id, kind, receiver))
}
