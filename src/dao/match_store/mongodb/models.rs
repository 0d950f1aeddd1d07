use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    CancelReason, EndReason, FighterVitals, MatchEntity, MatchStatus, MoveAction, MoveRecord,
    PresenceEntity, RoundEndReason, RoundEntity, RoundResolution, Slot, StakeEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    player_a: String,
    player_b: Option<String>,
    character_a: Option<String>,
    character_b: Option<String>,
    status: MatchStatus,
    wins_a: u32,
    wins_b: u32,
    best_of: u32,
    winner: Option<Slot>,
    end_reason: Option<EndReason>,
    cancel_reason: Option<CancelReason>,
    stake: Option<MongoStake>,
    presence_a: MongoPresence,
    presence_b: MongoPresence,
    created_at: DateTime,
    started_at: Option<DateTime>,
    completed_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStake {
    amount: u64,
    deposit_a: Option<String>,
    deposit_b: Option<String>,
    confirmed: bool,
    deposit_deadline: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPresence {
    connected: bool,
    last_seen: DateTime,
    disconnected_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    match_id: Uuid,
    number: u32,
    move_deadline: DateTime,
    move_a: Option<MongoMove>,
    move_b: Option<MongoMove>,
    rejected_a: Option<DateTime>,
    rejected_b: Option<DateTime>,
    resolution: Option<MongoResolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMove {
    action: MoveAction,
    submitted_at: DateTime,
    proof: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoResolution {
    winner: Option<Slot>,
    reason: RoundEndReason,
    vitals_a: Option<FighterVitals>,
    vitals_b: Option<FighterVitals>,
    resolved_at: DateTime,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            player_a: value.player_a,
            player_b: value.player_b,
            character_a: value.character_a,
            character_b: value.character_b,
            status: value.status,
            wins_a: value.wins_a,
            wins_b: value.wins_b,
            best_of: value.best_of,
            winner: value.winner,
            end_reason: value.end_reason,
            cancel_reason: value.cancel_reason,
            stake: value.stake.map(Into::into),
            presence_a: value.presence_a.into(),
            presence_b: value.presence_b.into(),
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            player_a: value.player_a,
            player_b: value.player_b,
            character_a: value.character_a,
            character_b: value.character_b,
            status: value.status,
            wins_a: value.wins_a,
            wins_b: value.wins_b,
            best_of: value.best_of,
            winner: value.winner,
            end_reason: value.end_reason,
            cancel_reason: value.cancel_reason,
            stake: value.stake.map(Into::into),
            presence_a: value.presence_a.into(),
            presence_b: value.presence_b.into(),
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
        }
    }
}

impl From<StakeEntity> for MongoStake {
    fn from(value: StakeEntity) -> Self {
        Self {
            amount: value.amount,
            deposit_a: value.deposit_a,
            deposit_b: value.deposit_b,
            confirmed: value.confirmed,
            deposit_deadline: DateTime::from_system_time(value.deposit_deadline),
        }
    }
}

impl From<MongoStake> for StakeEntity {
    fn from(value: MongoStake) -> Self {
        Self {
            amount: value.amount,
            deposit_a: value.deposit_a,
            deposit_b: value.deposit_b,
            confirmed: value.confirmed,
            deposit_deadline: value.deposit_deadline.to_system_time(),
        }
    }
}

impl From<PresenceEntity> for MongoPresence {
    fn from(value: PresenceEntity) -> Self {
        Self {
            connected: value.connected,
            last_seen: DateTime::from_system_time(value.last_seen),
            disconnected_at: value.disconnected_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoPresence> for PresenceEntity {
    fn from(value: MongoPresence) -> Self {
        Self {
            connected: value.connected,
            last_seen: value.last_seen.to_system_time(),
            disconnected_at: value.disconnected_at.map(|at| at.to_system_time()),
        }
    }
}

impl From<RoundEntity> for MongoRoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            match_id: value.match_id,
            number: value.number,
            move_deadline: DateTime::from_system_time(value.move_deadline),
            move_a: value.move_a.map(Into::into),
            move_b: value.move_b.map(Into::into),
            rejected_a: value.rejected_a.map(DateTime::from_system_time),
            rejected_b: value.rejected_b.map(DateTime::from_system_time),
            resolution: value.resolution.map(Into::into),
        }
    }
}

impl From<MongoRoundDocument> for RoundEntity {
    fn from(value: MongoRoundDocument) -> Self {
        Self {
            match_id: value.match_id,
            number: value.number,
            move_deadline: value.move_deadline.to_system_time(),
            move_a: value.move_a.map(Into::into),
            move_b: value.move_b.map(Into::into),
            rejected_a: value.rejected_a.map(|at| at.to_system_time()),
            rejected_b: value.rejected_b.map(|at| at.to_system_time()),
            resolution: value.resolution.map(Into::into),
        }
    }
}

impl From<MoveRecord> for MongoMove {
    fn from(value: MoveRecord) -> Self {
        Self {
            action: value.action,
            submitted_at: DateTime::from_system_time(value.submitted_at),
            proof: value.proof,
        }
    }
}

impl From<MongoMove> for MoveRecord {
    fn from(value: MongoMove) -> Self {
        Self {
            action: value.action,
            submitted_at: value.submitted_at.to_system_time(),
            proof: value.proof,
        }
    }
}

impl From<RoundResolution> for MongoResolution {
    fn from(value: RoundResolution) -> Self {
        Self {
            winner: value.winner,
            reason: value.reason,
            vitals_a: value.vitals_a,
            vitals_b: value.vitals_b,
            resolved_at: DateTime::from_system_time(value.resolved_at),
        }
    }
}

impl From<MongoResolution> for RoundResolution {
    fn from(value: MongoResolution) -> Self {
        Self {
            winner: value.winner,
            reason: value.reason,
            vitals_a: value.vitals_a,
            vitals_b: value.vitals_b,
            resolved_at: value.resolved_at.to_system_time(),
        }
    }
}

fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

pub fn doc_match_id(id: Uuid) -> Document {
    doc! {"match_id": uuid_as_binary(id)}
}

/// Stable wire name of a status, used inside update filters. Must agree with
/// the serde representation of [`MatchStatus`].
pub fn status_literal(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Waiting => "waiting",
        MatchStatus::CharacterSelect => "character_select",
        MatchStatus::InProgress => "in_progress",
        MatchStatus::Completed => "completed",
        MatchStatus::Cancelled => "cancelled",
    }
}

/// Stable wire name of a slot, used inside update documents.
pub fn slot_literal(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "a",
        Slot::B => "b",
    }
}

/// Field name holding `slot`'s character pick.
pub fn character_field(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "character_a",
        Slot::B => "character_b",
    }
}

/// Field name holding `slot`'s win tally.
pub fn wins_field(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "wins_a",
        Slot::B => "wins_b",
    }
}

/// Field name holding `slot`'s move record.
pub fn move_field(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "move_a",
        Slot::B => "move_b",
    }
}

/// Field name holding `slot`'s rejection timestamp.
pub fn rejected_field(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "rejected_a",
        Slot::B => "rejected_b",
    }
}

/// Field prefix holding `slot`'s presence record.
pub fn presence_field(slot: Slot) -> &'static str {
    match slot {
        Slot::A => "presence_a",
        Slot::B => "presence_b",
    }
}

/// Stable wire name of an end reason, used inside update documents.
pub fn end_reason_literal(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Rounds => "rounds",
        EndReason::Forfeit => "forfeit",
        EndReason::Timeout => "timeout",
    }
}

/// Stable wire name of a cancel reason, used inside update documents.
pub fn cancel_reason_literal(reason: CancelReason) -> &'static str {
    match reason {
        CancelReason::StakeExpired => "stake_expired",
        CancelReason::MutualTimeout => "mutual_timeout",
        CancelReason::MutualReject => "mutual_reject",
    }
}

/// Build the update sub-document persisting a round resolution.
pub fn resolution_doc(resolution: &RoundResolution) -> Document {
    let vitals = |value: &Option<FighterVitals>| {
        value.map(|vitals| {
            doc! {
                "health": vitals.health,
                "energy": vitals.energy,
                "guard": vitals.guard,
            }
        })
    };
    let reason = match resolution.reason {
        RoundEndReason::Combat => "combat",
        RoundEndReason::Timeout => "timeout",
        RoundEndReason::Reject => "reject",
        RoundEndReason::Abandoned => "abandoned",
    };

    doc! {
        "winner": resolution.winner.map(slot_literal),
        "reason": reason,
        "vitals_a": vitals(&resolution.vitals_a),
        "vitals_b": vitals(&resolution.vitals_b),
        "resolved_at": DateTime::from_system_time(resolution.resolved_at),
    }
}

/// Build the update sub-document persisting a move record.
pub fn move_doc(record: &MoveRecord) -> Document {
    let action = match record.action {
        MoveAction::Strike => "strike",
        MoveAction::Guard => "guard",
        MoveAction::Special => "special",
    };

    doc! {
        "action": action,
        "submitted_at": DateTime::from_system_time(record.submitted_at),
        "proof": record.proof.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_agree_with_serde_names() {
        for status in [
            MatchStatus::Waiting,
            MatchStatus::CharacterSelect,
            MatchStatus::InProgress,
            MatchStatus::Completed,
            MatchStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status_literal(status)));
        }

        for slot in [Slot::A, Slot::B] {
            let json = serde_json::to_string(&slot).unwrap();
            assert_eq!(json, format!("\"{}\"", slot_literal(slot)));
        }

        for reason in [EndReason::Rounds, EndReason::Forfeit, EndReason::Timeout] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", end_reason_literal(reason)));
        }

        for reason in [
            CancelReason::StakeExpired,
            CancelReason::MutualTimeout,
            CancelReason::MutualReject,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", cancel_reason_literal(reason)));
        }
    }

    #[test]
    fn match_document_round_trips() {
        use std::time::{Duration, SystemTime};

        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut entity = MatchEntity::create(Uuid::new_v4(), "a".repeat(64), 3, None, now);
        entity.player_b = Some("b".repeat(64));
        entity.character_a = Some("razor".into());
        entity.status = MatchStatus::CharacterSelect;

        let document: MongoMatchDocument = entity.clone().into();
        let back: MatchEntity = document.into();
        assert_eq!(back, entity);
    }
}
