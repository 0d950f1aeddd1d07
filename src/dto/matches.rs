use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{common::MatchSummary, validation::validate_player_id};

/// Payload used by the room/matchmaking collaborator to open a match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    /// Host participant (slot A), a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Optional match format; must be odd. Defaults to the configured format.
    #[serde(default)]
    pub best_of: Option<u32>,
    /// Optional stake amount; a value opens a deposit window that gates
    /// activation until the staking collaborator confirms both deposits.
    #[serde(default)]
    pub stake_amount: Option<u64>,
}

/// Payload used by an opponent to claim slot B.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinMatchRequest {
    /// Joining participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
}

/// Payload carrying a signed surrender.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ForfeitRequest {
    /// Surrendering participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
    /// Base64 ed25519 signature over the fixed forfeit message template.
    #[validate(length(min = 1, max = 128))]
    pub signature: String,
}

/// Response returned once a forfeit has been applied.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForfeitResponse {
    /// Participant awarded the match.
    pub winner: String,
    /// Authoritative match projection after the forfeit.
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
}
