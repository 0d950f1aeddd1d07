use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::MatchStatus,
    dto::validation::{validate_character_id, validate_player_id},
};

/// Payload submitting (and optionally confirming) a character pick.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitSelectionRequest {
    /// Requesting participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Roster character id to persist for the requester's slot.
    #[validate(custom(function = validate_character_id))]
    pub character_id: String,
    /// When true, attempt activation once both picks are present.
    #[serde(default)]
    pub confirm: bool,
}

/// Readiness state returned from a selection submit or confirm.
///
/// Both racers of a simultaneous confirm receive the same terminal shape:
/// `match_ready = true` with both character ids, so a client can proceed
/// locally even if it never sees the broadcast.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectionResponse {
    /// Whether the requester's pick is confirmed.
    pub is_confirmed: bool,
    /// Whether the opponent's pick is present.
    pub opponent_ready: bool,
    /// Whether the match has been (or just was) activated.
    pub match_ready: bool,
    /// Slot A's pick; populated once `match_ready`.
    pub player_a_character: Option<String>,
    /// Slot B's pick; populated once `match_ready`.
    pub player_b_character: Option<String>,
    /// Authoritative match status after the call.
    pub status: MatchStatus,
}

/// Read-only selection state for one participant.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectionStateResponse {
    /// The requester's own pick, if made.
    pub own_character: Option<String>,
    /// The opponent's pick, if made.
    pub opponent_character: Option<String>,
    /// Authoritative match status.
    pub status: MatchStatus,
    /// Whether the match has been activated.
    pub match_ready: bool,
}
