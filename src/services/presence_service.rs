use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{MatchEntity, MatchStatus, RoundEntity, Slot},
    },
    dto::{
        common::FighterState,
        presence::{FighterSnapshot, ReconnectSnapshot},
        unix_millis,
    },
    error::ServiceError,
    services::{match_service, round_service},
    state::SharedState,
};

/// Mark a participant disconnected. Idempotent and deliberately forgiving:
/// presence is always re-derivable, so a lost call costs nothing.
pub async fn record_disconnect(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let slot = participant_slot(&entity, player_id)?;

    store.set_presence(match_id, slot, false, now).await?;
    debug!(match_id = %match_id, slot = ?slot, "participant disconnected");
    Ok(())
}

/// Best-effort disconnect used by SSE stream teardown; only logs failures.
pub(crate) async fn mark_disconnected_quiet(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) {
    if let Err(err) = record_disconnect(state, match_id, player_id, now).await {
        warn!(match_id = %match_id, error = %err, "failed to record stream disconnect");
    }
}

/// Mark a participant reconnected and assemble a full state snapshot.
///
/// The snapshot is computed from persisted state alone, never from event
/// history: the bus offers no delivery guarantee to a client that was
/// offline.
pub async fn record_reconnect(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) -> Result<ReconnectSnapshot, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let entity = match_service::expire_stake_if_due(state, &store, entity, now).await?;
    let slot = participant_slot(&entity, player_id)?;

    let entity = store
        .set_presence(match_id, slot, true, now)
        .await?
        .unwrap_or(entity);
    info!(match_id = %match_id, slot = ?slot, "participant reconnected");

    build_snapshot(state, &store, &entity, now).await
}

/// Assemble the store-derived snapshot for `entity`.
pub(crate) async fn build_snapshot(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
    now: SystemTime,
) -> Result<ReconnectSnapshot, ServiceError> {
    let open_round = if entity.status == MatchStatus::InProgress {
        Some(round_service::current_round(state, store, entity, now).await?)
    } else {
        None
    };

    let (vitals_a, vitals_b) = current_vitals(state, store, entity).await?;

    let fighter = |slot: Slot, vitals: Option<FighterState>| FighterSnapshot {
        slot,
        player_id: entity.player(slot).map(str::to_string),
        character_id: entity.character(slot).map(str::to_string),
        wins: entity.wins(slot),
        vitals,
        pending_move: open_round
            .as_ref()
            .is_some_and(|round| !round.acted(slot)),
        connected: entity.presence(slot).connected,
    };

    Ok(ReconnectSnapshot {
        status: entity.status,
        round_number: open_round.as_ref().map(|round| round.number),
        move_deadline_ms: open_round
            .as_ref()
            .map(|round| unix_millis(round.move_deadline)),
        best_of: entity.best_of,
        fighter_a: fighter(Slot::A, vitals_a),
        fighter_b: fighter(Slot::B, vitals_b),
        winner: entity.winner,
        end_reason: entity.end_reason,
        cancel_reason: entity.cancel_reason,
    })
}

/// Current vitals per slot: the latest engine-reported values when a round
/// has resolved, the character's base stats otherwise.
async fn current_vitals(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
) -> Result<(Option<FighterState>, Option<FighterState>), ServiceError> {
    let reported = match store.find_latest_round(entity.id).await? {
        Some(round) if round.is_resolved() => resolution_vitals(&round),
        Some(round) if round.number > 1 => {
            match store.find_round(entity.id, round.number - 1).await? {
                Some(previous) => resolution_vitals(&previous),
                None => (None, None),
            }
        }
        _ => (None, None),
    };

    let base = |slot: Slot| {
        entity
            .character(slot)
            .and_then(|id| state.config().character(id))
            .map(|character| FighterState::from(character.vitals))
    };

    Ok((
        reported.0.or_else(|| base(Slot::A)),
        reported.1.or_else(|| base(Slot::B)),
    ))
}

fn resolution_vitals(round: &RoundEntity) -> (Option<FighterState>, Option<FighterState>) {
    match &round.resolution {
        Some(resolution) => (
            resolution.vitals_a.map(Into::into),
            resolution.vitals_b.map(Into::into),
        ),
        None => (None, None),
    }
}

fn participant_slot(entity: &MatchEntity, player_id: &str) -> Result<Slot, ServiceError> {
    entity.slot_of(player_id).ok_or_else(|| {
        ServiceError::Forbidden("requester is not a participant of this match".into())
    })
}
