use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{CancelReason, EndReason, RoundEndReason, Slot},
    dto::common::FighterState,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across per-match SSE channels.
pub struct ServerEvent {
    /// SSE event name, when the payload is typed.
    pub event: Option<String>,
    /// Serialized JSON data field.
    pub data: String,
}

impl ServerEvent {
    /// Build an event with a pre-serialized data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Match the stream is scoped to.
    pub match_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on every successful confirm, regardless of the activation race.
pub struct CharacterSelectedEvent {
    /// Slot whose pick was confirmed.
    pub slot: Slot,
    /// Confirmed character id.
    pub character_id: String,
    /// Whether both picks are now present.
    pub both_ready: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast exactly once per match, by the caller that won the activation race.
pub struct MatchStartingEvent {
    /// Activated match.
    pub match_id: Uuid,
    /// Slot A participant.
    pub player_a: String,
    /// Slot B participant.
    pub player_b: String,
    /// Slot A character.
    pub player_a_character: String,
    /// Slot B character.
    pub player_b_character: String,
    /// Match format (best of N).
    pub best_of: u32,
    /// Future gameplay start in Unix milliseconds, for the client countdown.
    pub starts_at_ms: i64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round opens.
pub struct RoundStartingEvent {
    /// 1-based round number.
    pub round: u32,
    /// Absolute move deadline in Unix milliseconds.
    pub move_deadline_ms: i64,
    /// Starting state for slot A.
    pub fighter_a: FighterState,
    /// Starting state for slot B.
    pub fighter_b: FighterState,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a slot's move has been recorded.
///
/// Deliberately omits the chosen action so the opponent learns nothing
/// before resolution.
pub struct MoveSubmittedEvent {
    /// Round the move belongs to.
    pub round: u32,
    /// Slot that moved.
    pub slot: Slot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once both moves of a round are in and resolution can run.
pub struct MoveConfirmedEvent {
    /// Round whose moves are complete.
    pub round: u32,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round concludes.
pub struct RoundResolvedEvent {
    /// Concluded round number.
    pub round: u32,
    /// Winning slot; absent for a draw or abandoned round.
    pub winner: Option<Slot>,
    /// How the round concluded.
    pub reason: RoundEndReason,
    /// Round wins for slot A after the resolution.
    pub wins_a: u32,
    /// Round wins for slot B after the resolution.
    pub wins_b: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a match reaches `completed`.
pub struct MatchEndedEvent {
    /// Winning slot.
    pub winner: Slot,
    /// Winning participant id.
    pub winner_id: String,
    /// Why the match ended.
    pub reason: EndReason,
    /// Final round wins for slot A.
    pub wins_a: u32,
    /// Final round wins for slot B.
    pub wins_b: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a match reaches `cancelled`.
pub struct MatchCancelledEvent {
    /// Why the match was cancelled.
    pub reason: CancelReason,
}
