use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        CancelReason, EndReason, FighterVitals, MatchEntity, MatchStatus, Slot, StakeEntity,
    },
    dto::{format_system_time, unix_millis, validation::validate_player_id},
};

/// Query identifying the requesting participant on read-only endpoints.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct PlayerIdQuery {
    /// Requesting participant, a hex-encoded ed25519 public key.
    #[validate(custom(function = validate_player_id))]
    pub player_id: String,
}

/// Query attaching an optional participant identity to an event stream.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct StreamIdentityQuery {
    /// Optional participant id; present for players, absent for spectators.
    #[serde(default)]
    #[validate(custom(function = validate_player_id))]
    pub player_id: Option<String>,
}

/// Public projection of a match exposed to REST and SSE clients.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Host participant (slot A).
    pub player_a: String,
    /// Guest participant (slot B), once joined.
    pub player_b: Option<String>,
    /// Character pick for slot A, once made.
    pub character_a: Option<String>,
    /// Character pick for slot B, once made.
    pub character_b: Option<String>,
    /// Round wins for slot A.
    pub wins_a: u32,
    /// Round wins for slot B.
    pub wins_b: u32,
    /// Match format (best of N).
    pub best_of: u32,
    /// Winning slot, once completed.
    pub winner: Option<Slot>,
    /// Why the match completed, once it did.
    pub end_reason: Option<EndReason>,
    /// Why the match was cancelled, once it was.
    pub cancel_reason: Option<CancelReason>,
    /// Stake attached to the match, if any.
    pub stake: Option<StakeSummary>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Activation timestamp (RFC 3339), once started.
    pub started_at: Option<String>,
    /// Terminal timestamp (RFC 3339), once completed or cancelled.
    pub completed_at: Option<String>,
}

/// Stake projection exposed alongside a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StakeSummary {
    /// Stake amount in the smallest token denomination.
    pub amount: u64,
    /// Whether both deposits have been confirmed by the staking collaborator.
    pub confirmed: bool,
    /// Deposit deadline in Unix milliseconds.
    pub deposit_deadline_ms: i64,
}

impl From<StakeEntity> for StakeSummary {
    fn from(value: StakeEntity) -> Self {
        Self {
            amount: value.amount,
            confirmed: value.confirmed,
            deposit_deadline_ms: unix_millis(value.deposit_deadline),
        }
    }
}

impl From<MatchEntity> for MatchSummary {
    fn from(entity: MatchEntity) -> Self {
        Self {
            id: entity.id,
            status: entity.status,
            player_a: entity.player_a,
            player_b: entity.player_b,
            character_a: entity.character_a,
            character_b: entity.character_b,
            wins_a: entity.wins_a,
            wins_b: entity.wins_b,
            best_of: entity.best_of,
            winner: entity.winner,
            end_reason: entity.end_reason,
            cancel_reason: entity.cancel_reason,
            stake: entity.stake.map(Into::into),
            created_at: format_system_time(entity.created_at),
            started_at: entity.started_at.map(format_system_time),
            completed_at: entity.completed_at.map(format_system_time),
        }
    }
}

/// Fighter state pushed at round start and inside snapshots.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct FighterState {
    /// Current vitals.
    pub health: i32,
    /// Current energy.
    pub energy: i32,
    /// Current guard.
    pub guard: i32,
    /// Whether the fighter starts the round stunned.
    pub stunned: bool,
}

impl From<FighterVitals> for FighterState {
    fn from(value: FighterVitals) -> Self {
        Self {
            health: value.health,
            energy: value.energy,
            guard: value.guard,
            stunned: false,
        }
    }
}
