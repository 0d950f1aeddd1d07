use std::{convert::Infallible, time::Duration, time::SystemTime};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::{match_service, presence_service},
    state::SharedState,
};

/// Who is on the other end of a match event stream.
#[derive(Clone)]
pub enum StreamKind {
    /// Read-only observer; teardown only prunes the channel.
    Spectator,
    /// A participant; subscribing marks them connected and stream teardown
    /// marks them disconnected, best-effort.
    Player {
        /// Participant id behind the stream.
        player_id: String,
    },
}

/// Register a subscriber on a match channel, verifying the match exists so
/// streams cannot be opened against garbage ids.
pub async fn subscribe(
    state: &SharedState,
    match_id: Uuid,
    kind: &StreamKind,
    now: SystemTime,
) -> Result<broadcast::Receiver<ServerEvent>, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;

    if let StreamKind::Player { player_id } = kind {
        let slot = entity.slot_of(player_id).ok_or_else(|| {
            ServiceError::Forbidden("requester is not a participant of this match".into())
        })?;
        store.set_presence(match_id, slot, true, now).await?;
    }

    Ok(state.bus().subscribe(match_id))
}

/// Publish the greeting event new subscribers use to confirm the stream.
pub fn broadcast_stream_connected(state: &SharedState, match_id: Uuid, degraded: bool) {
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            match_id,
            message: "match stream connected".to_string(),
            degraded,
        },
    ) {
        state.bus().publish(match_id, event);
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    match_id: Uuid,
    kind: StreamKind,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive;
                            // the client recovers truth via reconnect.
                            continue;
                        }
                    }
                }
            }
        }

        // Own the necessary state inside the spawned task so we can clean up
        // even if the request context has already dropped.
        drop(receiver);
        if let StreamKind::Player { player_id } = &kind {
            presence_service::mark_disconnected_quiet(
                &state,
                match_id,
                player_id,
                SystemTime::now(),
            )
            .await;
        }
        state.bus().prune(match_id);
        tracing::info!(%match_id, "match SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
