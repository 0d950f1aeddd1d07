use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{
            EndReason, FighterVitals, MatchEntity, MatchStatus, MoveRecord, RoundEndReason,
            RoundEntity, RoundResolution, Slot,
        },
    },
    dto::{
        common::FighterState,
        rounds::{MoveReceipt, RoundOutcomeRequest, RoundOutcomeResponse, SubmitMoveRequest},
        unix_millis,
    },
    error::ServiceError,
    services::{match_service, rating_service, sse_events},
    state::SharedState,
};

/// Fallback stats for a slot whose character is missing from the roster
/// (e.g. the roster changed between deploys).
const FALLBACK_VITALS: FighterVitals = FighterVitals {
    health: 100,
    energy: 50,
    guard: 30,
};

/// What happened to the match after a round concluded.
pub(crate) enum RoundConclusion {
    /// The match reached a terminal status.
    MatchOver(MatchEntity),
    /// The tally advanced and the next round is open.
    Continues(MatchEntity, RoundEntity),
}

/// Record a move for the current round.
pub async fn submit_move(
    state: &SharedState,
    match_id: Uuid,
    request: SubmitMoveRequest,
    now: SystemTime,
) -> Result<MoveReceipt, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let slot = participant_slot(&entity, &request.player_id)?;
    ensure_in_progress(&entity)?;

    let round = current_round(state, &store, &entity, now).await?;
    if round.deadline_passed(now) {
        return Err(ServiceError::InvalidState(
            "move deadline has passed".into(),
        ));
    }

    let record = MoveRecord {
        action: request.action,
        submitted_at: now,
        proof: request.proof,
    };
    let Some(updated) = store
        .record_move(match_id, round.number, slot, record)
        .await?
    else {
        return Err(ServiceError::InvalidState(
            "a move or rejection is already recorded for this slot".into(),
        ));
    };

    sse_events::broadcast_move_submitted(state, match_id, updated.number, slot);

    // Act-complete rule: a move against an opponent who already declined
    // settles the round immediately in the mover's favor.
    if updated.rejected(slot.opponent()) {
        let resolution = RoundResolution {
            winner: Some(slot),
            reason: RoundEndReason::Reject,
            vitals_a: None,
            vitals_b: None,
            resolved_at: now,
        };
        conclude_round(
            state,
            &store,
            &entity,
            updated.number,
            resolution,
            EndReason::Rounds,
            now,
        )
        .await?;
        return Ok(MoveReceipt {
            round: updated.number,
            action: request.action,
            both_moves_in: false,
            move_deadline_ms: unix_millis(updated.move_deadline),
        });
    }

    let both_moves_in = updated.move_a.is_some() && updated.move_b.is_some();
    if both_moves_in {
        // Hand-off signal for the external resolution engine.
        sse_events::broadcast_move_confirmed(state, match_id, updated.number);
    }

    Ok(MoveReceipt {
        round: updated.number,
        action: request.action,
        both_moves_in,
        move_deadline_ms: unix_millis(updated.move_deadline),
    })
}

/// Apply a round outcome computed by the external resolution engine.
pub async fn apply_round_outcome(
    state: &SharedState,
    match_id: Uuid,
    number: u32,
    request: RoundOutcomeRequest,
    now: SystemTime,
) -> Result<RoundOutcomeResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    ensure_in_progress(&entity)?;

    let round = store
        .find_round(match_id, number)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("round {number} not found")))?;
    if round.is_resolved() {
        return Err(ServiceError::InvalidState("round already resolved".into()));
    }
    if round.move_a.is_none() || round.move_b.is_none() {
        return Err(ServiceError::InvalidState(
            "round moves are not complete".into(),
        ));
    }

    let resolution = RoundResolution {
        winner: request.winner,
        reason: RoundEndReason::Combat,
        vitals_a: request.vitals_a,
        vitals_b: request.vitals_b,
        resolved_at: now,
    };

    match conclude_round(
        state,
        &store,
        &entity,
        number,
        resolution,
        EndReason::Rounds,
        now,
    )
    .await?
    {
        Some(RoundConclusion::MatchOver(done)) => Ok(RoundOutcomeResponse {
            round: number,
            match_over: true,
            match_summary: done.into(),
        }),
        Some(RoundConclusion::Continues(current, _next)) => Ok(RoundOutcomeResponse {
            round: number,
            match_over: false,
            match_summary: current.into(),
        }),
        None => Err(ServiceError::InvalidState("round already resolved".into())),
    }
}

/// Conclude a round exactly once and drive the match forward: advance the
/// tally, then either complete the match or open the next round.
///
/// Returns `None` when another request already resolved the round; the
/// caller must re-read and answer consistently.
pub(crate) async fn conclude_round(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
    round_number: u32,
    resolution: RoundResolution,
    end_reason: EndReason,
    now: SystemTime,
) -> Result<Option<RoundConclusion>, ServiceError> {
    if store
        .resolve_round(entity.id, round_number, resolution.clone())
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let mut current = entity.clone();
    if let Some(winner) = resolution.winner {
        current = match store.award_round_win(entity.id, winner).await? {
            Some(awarded) => awarded,
            // The match left `in_progress` under us (a forfeit raced ahead);
            // the terminal state in the store wins.
            None => match_service::load_match(store, entity.id).await?,
        };
    }

    sse_events::broadcast_round_resolved(
        state,
        &current,
        round_number,
        resolution.winner,
        resolution.reason,
    );

    if let Some(winner) = resolution.winner
        && current.status == MatchStatus::InProgress
        && current.wins(winner) >= current.wins_needed()
    {
        let done = match store
            .complete_match(entity.id, winner, end_reason, now)
            .await?
        {
            Some(done) => {
                info!(match_id = %entity.id, winner = ?winner, reason = ?end_reason, "match completed");
                sse_events::broadcast_match_ended(state, &done);
                rating_service::notify_match_completed(state, &done);
                done
            }
            None => match_service::load_match(store, entity.id).await?,
        };
        return Ok(Some(RoundConclusion::MatchOver(done)));
    }

    if current.status != MatchStatus::InProgress {
        return Ok(Some(RoundConclusion::MatchOver(current)));
    }

    let next = open_round(state, store, &current, round_number + 1, now).await?;
    let (fighter_a, fighter_b) = fighter_states_after(state, &current, &resolution);
    sse_events::broadcast_round_starting(
        state,
        current.id,
        next.number,
        next.move_deadline,
        fighter_a,
        fighter_b,
    );

    Ok(Some(RoundConclusion::Continues(current, next)))
}

/// Create a round with a deadline computed from `now`. Idempotent: a
/// concurrent creator's round is returned unchanged.
pub(crate) async fn open_round(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
    number: u32,
    now: SystemTime,
) -> Result<RoundEntity, ServiceError> {
    let deadline = state.config().move_deadline(now);
    let round = store
        .insert_round(RoundEntity::open(entity.id, number, deadline))
        .await?;
    Ok(round)
}

/// Fetch the round currently awaiting moves, repairing gaps left by an
/// interrupted multi-step transition: an activation that died before
/// creating round 1, or a conclusion that died before opening the next
/// round. Repaired rounds get a deadline cut from the repairing request's
/// clock, per the lazy-deadline design. Callers must have checked the match
/// is `in_progress`.
pub(crate) async fn current_round(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
    now: SystemTime,
) -> Result<RoundEntity, ServiceError> {
    match store.find_latest_round(entity.id).await? {
        Some(round) if !round.is_resolved() => Ok(round),
        Some(round) => open_round(state, store, entity, round.number + 1, now).await,
        None => open_round(state, store, entity, 1, now).await,
    }
}

/// Starting states at activation, from character base stats.
pub(crate) fn base_fighter_states(
    state: &SharedState,
    entity: &MatchEntity,
) -> (FighterState, FighterState) {
    (
        base_state(state, entity.character(Slot::A)),
        base_state(state, entity.character(Slot::B)),
    )
}

/// Starting states for the round after `resolution`: engine-reported vitals
/// when present, character base stats otherwise.
fn fighter_states_after(
    state: &SharedState,
    entity: &MatchEntity,
    resolution: &RoundResolution,
) -> (FighterState, FighterState) {
    let (base_a, base_b) = base_fighter_states(state, entity);
    (
        resolution.vitals_a.map(Into::into).unwrap_or(base_a),
        resolution.vitals_b.map(Into::into).unwrap_or(base_b),
    )
}

fn base_state(state: &SharedState, character_id: Option<&str>) -> FighterState {
    character_id
        .and_then(|id| state.config().character(id))
        .map(|character| character.vitals.into())
        .unwrap_or_else(|| FALLBACK_VITALS.into())
}

fn participant_slot(entity: &MatchEntity, player_id: &str) -> Result<Slot, ServiceError> {
    entity.slot_of(player_id).ok_or_else(|| {
        ServiceError::Forbidden("requester is not a participant of this match".into())
    })
}

fn ensure_in_progress(entity: &MatchEntity) -> Result<(), ServiceError> {
    match entity.status {
        MatchStatus::InProgress => Ok(()),
        MatchStatus::Waiting | MatchStatus::CharacterSelect => Err(ServiceError::InvalidState(
            "match has not started yet".into(),
        )),
        MatchStatus::Completed | MatchStatus::Cancelled => {
            Err(ServiceError::InvalidState("match already ended".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::MoveAction,
        services::testing::{active_match, count_events, player_id, state_with_memory_store},
    };
    use std::time::Duration;

    fn strike(seed: u8) -> SubmitMoveRequest {
        SubmitMoveRequest {
            player_id: player_id(seed),
            action: MoveAction::Strike,
            proof: None,
        }
    }

    fn outcome(winner: Slot) -> RoundOutcomeRequest {
        RoundOutcomeRequest {
            winner: Some(winner),
            vitals_a: Some(FighterVitals {
                health: 80,
                energy: 45,
                guard: 25,
            }),
            vitals_b: Some(FighterVitals {
                health: 60,
                energy: 30,
                guard: 40,
            }),
        }
    }

    #[tokio::test]
    async fn both_moves_trigger_the_confirmation_event() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        let first = submit_move(&state, match_id, strike(1), now).await.unwrap();
        assert!(!first.both_moves_in);

        let second = submit_move(&state, match_id, strike(2), now).await.unwrap();
        assert!(second.both_moves_in);
        assert_eq!(second.round, 1);

        assert_eq!(count_events(&mut events, "move_confirmed"), 1);
    }

    #[tokio::test]
    async fn moves_after_the_deadline_are_rejected() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        let past_deadline = state.config().move_deadline(now) + Duration::from_millis(1);
        let result = submit_move(&state, match_id, strike(1), past_deadline).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn one_move_per_slot_per_round() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        submit_move(&state, match_id, strike(1), now).await.unwrap();
        let repeat = submit_move(&state, match_id, strike(1), now).await;
        assert!(matches!(repeat, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn outcome_advances_the_tally_and_opens_the_next_round() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        submit_move(&state, match_id, strike(1), now).await.unwrap();
        submit_move(&state, match_id, strike(2), now).await.unwrap();

        let mut events = state.bus().subscribe(match_id);
        let later = now + Duration::from_secs(5);
        let applied = apply_round_outcome(&state, match_id, 1, outcome(Slot::A), later)
            .await
            .unwrap();
        assert!(!applied.match_over);
        assert_eq!(applied.match_summary.wins_a, 1);
        assert_eq!(applied.match_summary.wins_b, 0);

        assert_eq!(count_events(&mut events, "round_resolved"), 1);

        let store = state.match_store().await.unwrap();
        let next = store.find_round(match_id, 2).await.unwrap().unwrap();
        assert_eq!(next.move_deadline, state.config().move_deadline(later));
    }

    #[tokio::test]
    async fn outcome_is_applied_at_most_once() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        submit_move(&state, match_id, strike(1), now).await.unwrap();
        submit_move(&state, match_id, strike(2), now).await.unwrap();

        apply_round_outcome(&state, match_id, 1, outcome(Slot::A), now)
            .await
            .unwrap();
        let repeat = apply_round_outcome(&state, match_id, 1, outcome(Slot::B), now).await;
        assert!(matches!(repeat, Err(ServiceError::InvalidState(_))));

        let store = state.match_store().await.unwrap();
        let entity = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!((entity.wins_a, entity.wins_b), (1, 0));
    }

    #[tokio::test]
    async fn outcome_requires_both_moves() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        submit_move(&state, match_id, strike(1), now).await.unwrap();

        let result = apply_round_outcome(&state, match_id, 1, outcome(Slot::A), now).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn reaching_the_win_target_completes_the_match() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        // Best of 3: two round wins close the match.
        for round in 1..=2u32 {
            let at = now + Duration::from_secs(u64::from(round));
            submit_move(&state, match_id, strike(1), at).await.unwrap();
            submit_move(&state, match_id, strike(2), at).await.unwrap();
            apply_round_outcome(&state, match_id, round, outcome(Slot::A), at)
                .await
                .unwrap();
        }

        let store = state.match_store().await.unwrap();
        let entity = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(entity.status, MatchStatus::Completed);
        assert_eq!(entity.winner, Some(Slot::A));
        assert_eq!(entity.end_reason, Some(EndReason::Rounds));
        assert_eq!(entity.wins_a, 2);

        assert_eq!(count_events(&mut events, "match_ended"), 1);
    }

    #[tokio::test]
    async fn missing_round_one_is_repaired_lazily() {
        let (state, now) = state_with_memory_store().await;
        let store = state.match_store().await.unwrap();

        // Simulate an activation that persisted the status flip but died
        // before creating round 1.
        let mut entity =
            MatchEntity::create(Uuid::new_v4(), player_id(1), 3, None, now);
        entity.player_b = Some(player_id(2));
        entity.character_a = Some("razor".into());
        entity.character_b = Some("bulwark".into());
        entity.status = MatchStatus::InProgress;
        entity.started_at = Some(now);
        let match_id = entity.id;
        store.create_match(entity).await.unwrap();

        let later = now + Duration::from_secs(60);
        let receipt = submit_move(&state, match_id, strike(1), later).await.unwrap();
        assert_eq!(receipt.round, 1);

        let round = store.find_round(match_id, 1).await.unwrap().unwrap();
        assert_eq!(round.move_deadline, state.config().move_deadline(later));
    }

    #[tokio::test]
    async fn moving_against_a_decline_settles_the_round() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let store = state.match_store().await.unwrap();

        store
            .record_reject(match_id, 1, Slot::B, now)
            .await
            .unwrap()
            .unwrap();

        let receipt = submit_move(&state, match_id, strike(1), now).await.unwrap();
        assert!(!receipt.both_moves_in);

        let entity = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(entity.wins_a, 1);
        let round = store.find_round(match_id, 1).await.unwrap().unwrap();
        assert_eq!(
            round.resolution.as_ref().map(|r| r.reason),
            Some(RoundEndReason::Reject)
        );
        assert!(store.find_round(match_id, 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn moves_are_refused_before_activation() {
        let (state, now) = state_with_memory_store().await;
        let match_id = crate::services::testing::picked_match(&state, now).await;

        let result = submit_move(&state, match_id, strike(1), now).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }
}
