use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// One of the two fixed participant positions in a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Host slot, filled at match creation.
    A,
    /// Guest slot, filled when an opponent joins.
    B,
}

impl Slot {
    /// The other participant position.
    pub fn opponent(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Lifecycle status of a match.
///
/// The status only ever advances; `Cancelled` is the one absorbing state
/// reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Slot B is still empty; the match waits for an opponent.
    Waiting,
    /// Both slots are filled and character picks are pending.
    CharacterSelect,
    /// Both picks confirmed, round 1 exists, combat is underway.
    InProgress,
    /// Terminal: a winner has been recorded.
    Completed,
    /// Terminal: the match ended without a winner.
    Cancelled,
}

impl MatchStatus {
    /// Whether a transition to `to` is permitted by the lifecycle rules.
    pub fn can_transition_to(self, to: MatchStatus) -> bool {
        match (self, to) {
            (MatchStatus::Waiting, MatchStatus::CharacterSelect) => true,
            (MatchStatus::CharacterSelect, MatchStatus::InProgress) => true,
            // Forfeit can complete a match as soon as an opponent exists.
            (MatchStatus::CharacterSelect, MatchStatus::Completed) => true,
            (MatchStatus::InProgress, MatchStatus::Completed) => true,
            (from, MatchStatus::Cancelled) if !from.is_terminal() => true,
            _ => false,
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// Whether the match has not yet been activated.
    pub fn is_pre_activation(self) -> bool {
        matches!(self, MatchStatus::Waiting | MatchStatus::CharacterSelect)
    }
}

/// Why a completed match ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// One side reached the required number of round wins.
    Rounds,
    /// A participant surrendered with a signed forfeit.
    Forfeit,
    /// The opponent missed a move deadline and the round tally resolved the match.
    Timeout,
}

/// Why a cancelled match ended without a winner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The stake deposit window expired before both deposits confirmed.
    StakeExpired,
    /// Neither participant moved before the deadline.
    MutualTimeout,
    /// Both participants rejected the same round.
    MutualReject,
}

/// Why a round concluded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    /// The external resolution engine reported a combat outcome.
    Combat,
    /// The opponent missed the move deadline.
    Timeout,
    /// A participant declined to move.
    Reject,
    /// Neither participant acted; the round fell with the match.
    Abandoned,
}

/// Combat-facing stats for one fighter at a point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct FighterVitals {
    /// Remaining health points.
    pub health: i32,
    /// Remaining energy points.
    pub energy: i32,
    /// Remaining guard points.
    pub guard: i32,
}

/// Move variants a fighter can submit for a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoveAction {
    /// Offensive move.
    Strike,
    /// Defensive move.
    Guard,
    /// Character special move.
    Special,
}

/// A submitted move for one slot of a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveRecord {
    /// Which move was chosen.
    pub action: MoveAction,
    /// When the move was accepted by the orchestrator.
    pub submitted_at: SystemTime,
    /// Opaque proof-of-move reference issued by the wallet collaborator.
    pub proof: Option<String>,
}

/// Stake metadata owned by the match but mutated by the staking collaborator.
///
/// The orchestrator only reads `confirmed` as an activation gate and expires
/// the deposit window lazily.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeEntity {
    /// Stake amount in the smallest token denomination.
    pub amount: u64,
    /// Deposit transaction reference for slot A, once submitted.
    pub deposit_a: Option<String>,
    /// Deposit transaction reference for slot B, once submitted.
    pub deposit_b: Option<String>,
    /// Set by the staking collaborator once both deposits verified.
    pub confirmed: bool,
    /// Absolute instant after which missing deposits cancel the match.
    pub deposit_deadline: SystemTime,
}

/// Per-slot presence record used to gate timeout claims and answer
/// "can this player still act".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceEntity {
    /// Whether the slot currently holds a live connection.
    pub connected: bool,
    /// Last instant any request or stream touched this slot.
    pub last_seen: SystemTime,
    /// When the slot dropped its connection, if currently disconnected.
    pub disconnected_at: Option<SystemTime>,
}

impl PresenceEntity {
    /// Presence record for a slot that has never connected.
    pub fn initial(now: SystemTime) -> Self {
        Self {
            connected: false,
            last_seen: now,
            disconnected_at: None,
        }
    }
}

/// Aggregate match record persisted by the storage layer.
///
/// This is the single source of truth for the match lifecycle; every
/// transition is a conditional write against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Host participant (slot A), fixed at creation.
    pub player_a: String,
    /// Guest participant (slot B); empty while `Waiting`.
    pub player_b: Option<String>,
    /// Character pick for slot A, if made.
    pub character_a: Option<String>,
    /// Character pick for slot B, if made.
    pub character_b: Option<String>,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Round wins for slot A; only ever incremented.
    pub wins_a: u32,
    /// Round wins for slot B; only ever incremented.
    pub wins_b: u32,
    /// Match format; odd number of rounds (best of N).
    pub best_of: u32,
    /// Winning slot once the match completes.
    pub winner: Option<Slot>,
    /// Why the match completed, when it did.
    pub end_reason: Option<EndReason>,
    /// Why the match was cancelled, when it was.
    pub cancel_reason: Option<CancelReason>,
    /// Stake metadata when this match plays for a stake.
    pub stake: Option<StakeEntity>,
    /// Presence record for slot A.
    pub presence_a: PresenceEntity,
    /// Presence record for slot B.
    pub presence_b: PresenceEntity,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Activation timestamp, once `InProgress` is reached.
    pub started_at: Option<SystemTime>,
    /// Completion/cancellation timestamp, once terminal.
    pub completed_at: Option<SystemTime>,
}

impl MatchEntity {
    /// Build a fresh match in `Waiting` owned by `player_a`.
    pub fn create(
        id: Uuid,
        player_a: String,
        best_of: u32,
        stake: Option<StakeEntity>,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            player_a,
            player_b: None,
            character_a: None,
            character_b: None,
            status: MatchStatus::Waiting,
            wins_a: 0,
            wins_b: 0,
            best_of,
            winner: None,
            end_reason: None,
            cancel_reason: None,
            stake,
            presence_a: PresenceEntity::initial(now),
            presence_b: PresenceEntity::initial(now),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Which slot `player_id` occupies, if any.
    pub fn slot_of(&self, player_id: &str) -> Option<Slot> {
        if self.player_a == player_id {
            Some(Slot::A)
        } else if self.player_b.as_deref() == Some(player_id) {
            Some(Slot::B)
        } else {
            None
        }
    }

    /// Participant id occupying `slot`, if filled.
    pub fn player(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => Some(self.player_a.as_str()),
            Slot::B => self.player_b.as_deref(),
        }
    }

    /// Character pick for `slot`, if made.
    pub fn character(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.character_a.as_deref(),
            Slot::B => self.character_b.as_deref(),
        }
    }

    /// Round wins recorded for `slot`.
    pub fn wins(&self, slot: Slot) -> u32 {
        match slot {
            Slot::A => self.wins_a,
            Slot::B => self.wins_b,
        }
    }

    /// Presence record for `slot`.
    pub fn presence(&self, slot: Slot) -> &PresenceEntity {
        match slot {
            Slot::A => &self.presence_a,
            Slot::B => &self.presence_b,
        }
    }

    /// Round wins required to take the match.
    pub fn wins_needed(&self) -> u32 {
        self.best_of / 2 + 1
    }

    /// Whether both character picks are present.
    pub fn both_characters_picked(&self) -> bool {
        self.character_a.is_some() && self.character_b.is_some()
    }

    /// Whether the staking gate (if any) allows activation.
    pub fn stake_gate_open(&self) -> bool {
        self.stake.as_ref().is_none_or(|stake| stake.confirmed)
    }

    /// Whether an unconfirmed stake has outlived its deposit window.
    pub fn stake_window_expired(&self, now: SystemTime) -> bool {
        self.stake
            .as_ref()
            .is_some_and(|stake| !stake.confirmed && stake.deposit_deadline < now)
    }
}

/// The terminal facts recorded when a round concludes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundResolution {
    /// Slot that took the round; `None` for abandoned rounds.
    pub winner: Option<Slot>,
    /// How the round concluded.
    pub reason: RoundEndReason,
    /// Post-round vitals for slot A as reported by the resolution engine.
    pub vitals_a: Option<FighterVitals>,
    /// Post-round vitals for slot B as reported by the resolution engine.
    pub vitals_b: Option<FighterVitals>,
    /// When the round concluded.
    pub resolved_at: SystemTime,
}

/// Per-round record persisted by the storage layer.
///
/// Unique on `(match_id, number)`; created by the orchestrator when a round
/// begins and concluded exactly once via a conditional write on
/// `resolution == None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Match this round belongs to.
    pub match_id: Uuid,
    /// 1-based round number.
    pub number: u32,
    /// Absolute deadline after which outstanding moves forfeit.
    pub move_deadline: SystemTime,
    /// Move submitted by slot A, if any.
    pub move_a: Option<MoveRecord>,
    /// Move submitted by slot B, if any.
    pub move_b: Option<MoveRecord>,
    /// When slot A declined to move, if it did.
    pub rejected_a: Option<SystemTime>,
    /// When slot B declined to move, if it did.
    pub rejected_b: Option<SystemTime>,
    /// Terminal facts, once the round concluded.
    pub resolution: Option<RoundResolution>,
}

impl RoundEntity {
    /// Open a fresh round with the given absolute deadline.
    pub fn open(match_id: Uuid, number: u32, move_deadline: SystemTime) -> Self {
        Self {
            match_id,
            number,
            move_deadline,
            move_a: None,
            move_b: None,
            rejected_a: None,
            rejected_b: None,
            resolution: None,
        }
    }

    /// Move record for `slot`, if submitted.
    pub fn move_record(&self, slot: Slot) -> Option<&MoveRecord> {
        match slot {
            Slot::A => self.move_a.as_ref(),
            Slot::B => self.move_b.as_ref(),
        }
    }

    /// Whether `slot` declined to move this round.
    pub fn rejected(&self, slot: Slot) -> bool {
        match slot {
            Slot::A => self.rejected_a.is_some(),
            Slot::B => self.rejected_b.is_some(),
        }
    }

    /// Whether `slot` has acted this round, by moving or rejecting.
    pub fn acted(&self, slot: Slot) -> bool {
        self.move_record(slot).is_some() || self.rejected(slot)
    }

    /// Whether the move deadline lies strictly in the past at `now`.
    pub fn deadline_passed(&self, now: SystemTime) -> bool {
        self.move_deadline < now
    }

    /// Whether the round has concluded.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
