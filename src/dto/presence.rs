use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{CancelReason, EndReason, MatchStatus, Slot},
    dto::{common::FighterState, validation::validate_player_id},
};

/// Payload identifying the participant behind a presence transition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PresenceRequest {
    /// Participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
}

/// Per-slot view inside a reconnect snapshot.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct FighterSnapshot {
    /// Slot this view describes.
    pub slot: Slot,
    /// Participant id, once the slot is filled.
    pub player_id: Option<String>,
    /// Character pick, once made.
    pub character_id: Option<String>,
    /// Round wins so far.
    pub wins: u32,
    /// Current vitals (engine-reported, else character base stats).
    pub vitals: Option<FighterState>,
    /// Whether this slot still owes a move for the current round.
    pub pending_move: bool,
    /// Whether the slot currently holds a live connection.
    pub connected: bool,
}

/// Complete, store-derived description of current match state.
///
/// Sufficient for a client that missed every realtime event to
/// resynchronize from this one response; never derived from event history.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ReconnectSnapshot {
    /// Authoritative match status.
    pub status: MatchStatus,
    /// Current round number, once in progress.
    pub round_number: Option<u32>,
    /// Outstanding move deadline in Unix milliseconds, while a round is open.
    pub move_deadline_ms: Option<i64>,
    /// Match format (best of N).
    pub best_of: u32,
    /// Snapshot of slot A.
    pub fighter_a: FighterSnapshot,
    /// Snapshot of slot B.
    pub fighter_b: FighterSnapshot,
    /// Winning slot, once completed.
    pub winner: Option<Slot>,
    /// Why the match completed, once it did.
    pub end_reason: Option<EndReason>,
    /// Why the match was cancelled, once it was.
    pub cancel_reason: Option<CancelReason>,
}
