use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, RoundEndReason, Slot},
    dto::{
        common::FighterState,
        sse::{
            CharacterSelectedEvent, MatchCancelledEvent, MatchEndedEvent, MatchStartingEvent,
            MoveConfirmedEvent, MoveSubmittedEvent, RoundResolvedEvent, RoundStartingEvent,
            ServerEvent,
        },
        unix_millis,
    },
    state::SharedState,
};

const EVENT_CHARACTER_SELECTED: &str = "character_selected";
const EVENT_MATCH_STARTING: &str = "match_starting";
const EVENT_ROUND_STARTING: &str = "round_starting";
const EVENT_MOVE_SUBMITTED: &str = "move_submitted";
const EVENT_MOVE_CONFIRMED: &str = "move_confirmed";
const EVENT_ROUND_RESOLVED: &str = "round_resolved";
const EVENT_MATCH_ENDED: &str = "match_ended";
const EVENT_MATCH_CANCELLED: &str = "match_cancelled";

/// Broadcast a confirmed character pick; sent on every confirm regardless of
/// the activation race outcome.
pub fn broadcast_character_selected(
    state: &SharedState,
    match_id: Uuid,
    slot: Slot,
    character_id: &str,
    both_ready: bool,
) {
    let payload = CharacterSelectedEvent {
        slot,
        character_id: character_id.to_string(),
        both_ready,
    };
    send_match_event(state, match_id, EVENT_CHARACTER_SELECTED, &payload);
}

/// Broadcast the activation of a match, including the future start instant
/// clients count down towards.
pub fn broadcast_match_starting(
    state: &SharedState,
    entity: &MatchEntity,
    starts_at: std::time::SystemTime,
) {
    let (Some(player_b), Some(character_a), Some(character_b)) = (
        entity.player_b.clone(),
        entity.character_a.clone(),
        entity.character_b.clone(),
    ) else {
        warn!(match_id = %entity.id, "activation broadcast skipped: match record incomplete");
        return;
    };

    let payload = MatchStartingEvent {
        match_id: entity.id,
        player_a: entity.player_a.clone(),
        player_b,
        player_a_character: character_a,
        player_b_character: character_b,
        best_of: entity.best_of,
        starts_at_ms: unix_millis(starts_at),
    };
    send_match_event(state, entity.id, EVENT_MATCH_STARTING, &payload);
}

/// Broadcast the opening of a round with its deadline and starting states.
pub fn broadcast_round_starting(
    state: &SharedState,
    match_id: Uuid,
    round: u32,
    move_deadline: std::time::SystemTime,
    fighter_a: FighterState,
    fighter_b: FighterState,
) {
    let payload = RoundStartingEvent {
        round,
        move_deadline_ms: unix_millis(move_deadline),
        fighter_a,
        fighter_b,
    };
    send_match_event(state, match_id, EVENT_ROUND_STARTING, &payload);
}

/// Broadcast that a slot's move has been recorded.
pub fn broadcast_move_submitted(state: &SharedState, match_id: Uuid, round: u32, slot: Slot) {
    let payload = MoveSubmittedEvent { round, slot };
    send_match_event(state, match_id, EVENT_MOVE_SUBMITTED, &payload);
}

/// Broadcast that both moves of a round are in.
pub fn broadcast_move_confirmed(state: &SharedState, match_id: Uuid, round: u32) {
    let payload = MoveConfirmedEvent { round };
    send_match_event(state, match_id, EVENT_MOVE_CONFIRMED, &payload);
}

/// Broadcast a concluded round together with the updated tallies.
pub fn broadcast_round_resolved(
    state: &SharedState,
    entity: &MatchEntity,
    round: u32,
    winner: Option<Slot>,
    reason: RoundEndReason,
) {
    let payload = RoundResolvedEvent {
        round,
        winner,
        reason,
        wins_a: entity.wins_a,
        wins_b: entity.wins_b,
    };
    send_match_event(state, entity.id, EVENT_ROUND_RESOLVED, &payload);
}

/// Broadcast a completed match with a best-effort stats payload.
pub fn broadcast_match_ended(state: &SharedState, entity: &MatchEntity) {
    let (Some(winner), Some(reason)) = (entity.winner, entity.end_reason) else {
        warn!(match_id = %entity.id, "completion broadcast skipped: winner not recorded");
        return;
    };
    let Some(winner_id) = entity.player(winner) else {
        warn!(match_id = %entity.id, "completion broadcast skipped: winner slot empty");
        return;
    };

    let payload = MatchEndedEvent {
        winner,
        winner_id: winner_id.to_string(),
        reason,
        wins_a: entity.wins_a,
        wins_b: entity.wins_b,
    };
    send_match_event(state, entity.id, EVENT_MATCH_ENDED, &payload);
}

/// Broadcast a cancelled match.
pub fn broadcast_match_cancelled(state: &SharedState, entity: &MatchEntity) {
    let Some(reason) = entity.cancel_reason else {
        warn!(match_id = %entity.id, "cancellation broadcast skipped: reason not recorded");
        return;
    };

    let payload = MatchCancelledEvent { reason };
    send_match_event(state, entity.id, EVENT_MATCH_CANCELLED, &payload);
}

/// Serialize and publish onto the match channel. Publish failures only log;
/// the store stays authoritative and reconnect covers missed events.
fn send_match_event<T: Serialize>(state: &SharedState, match_id: Uuid, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => state.bus().publish(match_id, server_event),
        Err(err) => warn!(%match_id, event, error = %err, "failed to serialize event"),
    }
}
