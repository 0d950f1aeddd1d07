use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{FighterVitals, MoveAction, Slot},
    dto::{common::MatchSummary, validation::validate_player_id},
};

/// Payload submitting a move for the current round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitMoveRequest {
    /// Requesting participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Chosen move.
    pub action: MoveAction,
    /// Opaque proof-of-move reference issued by the wallet collaborator.
    #[serde(default)]
    #[validate(length(max = 256))]
    pub proof: Option<String>,
}

/// Receipt returned when a move has been recorded.
#[derive(Debug, Serialize, ToSchema)]
pub struct MoveReceipt {
    /// Round the move was recorded for.
    pub round: u32,
    /// Recorded move.
    pub action: MoveAction,
    /// Whether both slots have now moved (resolution pending).
    pub both_moves_in: bool,
    /// Round move deadline in Unix milliseconds.
    pub move_deadline_ms: i64,
}

/// Externally computed outcome for one round, reported by the resolution engine.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RoundOutcomeRequest {
    /// Slot that won the round; absent for a draw.
    #[serde(default)]
    pub winner: Option<Slot>,
    /// Post-round vitals for slot A.
    #[serde(default)]
    pub vitals_a: Option<FighterVitals>,
    /// Post-round vitals for slot B.
    #[serde(default)]
    pub vitals_b: Option<FighterVitals>,
}

/// Payload claiming an expired move deadline.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TimeoutClaimRequest {
    /// Claiming participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
}

/// How a timeout claim resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutClaimResult {
    /// The claim completed the match in the claimant's favor.
    Win,
    /// Mutual abandonment; the match was cancelled.
    Cancelled,
    /// The round fell to the claimant and the match continues.
    Continue,
}

/// Response returned from a timeout claim.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeoutClaimResponse {
    /// How the claim resolved.
    pub result: TimeoutClaimResult,
    /// Authoritative match projection after the claim.
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
}

/// Payload declining to submit a move for the current round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RejectRequest {
    /// Declining participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
}

/// How a reject resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectResult {
    /// The decline costs the requester the round.
    RoundLost,
    /// Both participants declined the same round; the match was cancelled.
    MatchCancelled,
}

/// Response returned from a reject.
#[derive(Debug, Serialize, ToSchema)]
pub struct RejectResponse {
    /// How the decline resolved.
    pub result: RejectResult,
    /// Authoritative match projection after the decline.
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
}

/// Response returned when an external round outcome has been applied.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundOutcomeResponse {
    /// Round the outcome was applied to.
    pub round: u32,
    /// Whether the outcome completed the match.
    pub match_over: bool,
    /// Authoritative match projection after the outcome.
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
}
