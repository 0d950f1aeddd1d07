use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        CancelReason, EndReason, MatchEntity, MatchStatus, RoundEndReason, RoundResolution, Slot,
    },
    dto::{
        matches::{ForfeitRequest, ForfeitResponse},
        rounds::{RejectResponse, RejectResult, TimeoutClaimResponse, TimeoutClaimResult},
    },
    error::ServiceError,
    services::{
        match_service, proof,
        proof::ProofError,
        rating_service,
        round_service::{self, RoundConclusion},
        sse_events,
    },
    state::SharedState,
};

/// Terminate a match on an explicitly signed surrender.
pub async fn forfeit(
    state: &SharedState,
    match_id: Uuid,
    request: ForfeitRequest,
    now: SystemTime,
) -> Result<ForfeitResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let slot = participant_slot(&entity, &request.player_id)?;

    proof::verify_forfeit(match_id, &request.player_id, &request.signature).map_err(
        |err| match err {
            ProofError::MalformedKey | ProofError::MalformedSignature => {
                ServiceError::InvalidInput(err.to_string())
            }
            ProofError::Invalid => ServiceError::Forbidden(err.to_string()),
        },
    )?;

    match entity.status {
        MatchStatus::Waiting => {
            return Err(ServiceError::InvalidState(
                "match has not started yet".into(),
            ));
        }
        MatchStatus::Completed | MatchStatus::Cancelled => {
            return Err(ServiceError::InvalidState("match already ended".into()));
        }
        MatchStatus::CharacterSelect | MatchStatus::InProgress => {}
    }

    let winner = slot.opponent();
    let Some(done) = store
        .complete_match(match_id, winner, EndReason::Forfeit, now)
        .await?
    else {
        return Err(ServiceError::InvalidState("match already ended".into()));
    };

    let winner_id = done
        .player(winner)
        .ok_or_else(|| {
            ServiceError::InvalidState("match has no opponent to award".into())
        })?
        .to_string();

    info!(match_id = %match_id, forfeiting = ?slot, "match forfeited");
    sse_events::broadcast_match_ended(state, &done);
    rating_service::notify_match_completed(state, &done);

    Ok(ForfeitResponse {
        winner: winner_id,
        match_summary: done.into(),
    })
}

/// Resolve an expired move deadline in the claimant's favor, or cancel the
/// match on mutual abandonment.
pub async fn claim_timeout(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) -> Result<TimeoutClaimResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let slot = participant_slot(&entity, player_id)?;
    ensure_in_progress(&entity)?;

    let round = round_service::current_round(state, &store, &entity, now).await?;
    if !round.deadline_passed(now) {
        return Err(ServiceError::InvalidState(
            "move deadline has not passed".into(),
        ));
    }

    let opponent = slot.opponent();
    if round.move_record(opponent).is_some() {
        return Err(ServiceError::InvalidState(
            "opponent has already moved; nothing to claim".into(),
        ));
    }

    if round.move_record(slot).is_none() {
        // Neither slot produced a move: mutual abandonment. The round falls
        // with the match, and no winner is declared.
        let resolution = RoundResolution {
            winner: None,
            reason: RoundEndReason::Abandoned,
            vitals_a: None,
            vitals_b: None,
            resolved_at: now,
        };
        let _ = store
            .resolve_round(match_id, round.number, resolution)
            .await?;

        return match store
            .cancel_match(match_id, CancelReason::MutualTimeout, now)
            .await?
        {
            Some(cancelled) => {
                info!(match_id = %match_id, "mutual abandonment; match cancelled");
                sse_events::broadcast_match_cancelled(state, &cancelled);
                Ok(TimeoutClaimResponse {
                    result: TimeoutClaimResult::Cancelled,
                    match_summary: cancelled.into(),
                })
            }
            None => {
                let current = match_service::load_match(&store, match_id).await?;
                if current.status == MatchStatus::Cancelled {
                    Ok(TimeoutClaimResponse {
                        result: TimeoutClaimResult::Cancelled,
                        match_summary: current.into(),
                    })
                } else {
                    Err(ServiceError::InvalidState("match already ended".into()))
                }
            }
        };
    }

    // The claimant moved, the opponent did not: the round falls to the
    // claimant and may close the match.
    let resolution = RoundResolution {
        winner: Some(slot),
        reason: RoundEndReason::Timeout,
        vitals_a: None,
        vitals_b: None,
        resolved_at: now,
    };
    let conclusion = round_service::conclude_round(
        state,
        &store,
        &entity,
        round.number,
        resolution,
        EndReason::Timeout,
        now,
    )
    .await?;

    let current = match conclusion {
        Some(RoundConclusion::MatchOver(done)) => done,
        Some(RoundConclusion::Continues(current, _)) => current,
        // A concurrent request concluded the round first; answer from the
        // store's current truth.
        None => match_service::load_match(&store, match_id).await?,
    };

    let result = match current.status {
        MatchStatus::Completed if current.winner == Some(slot) => TimeoutClaimResult::Win,
        MatchStatus::Cancelled => TimeoutClaimResult::Cancelled,
        _ => TimeoutClaimResult::Continue,
    };

    Ok(TimeoutClaimResponse {
        result,
        match_summary: current.into(),
    })
}

/// Record an explicit decline to move for the current round.
///
/// A lone decline commits the round loss but leaves the round open until
/// the opponent acts (act-complete rule); two declines in the same round
/// cancel the match outright.
pub async fn reject(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) -> Result<RejectResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let slot = participant_slot(&entity, player_id)?;
    ensure_in_progress(&entity)?;

    let round = round_service::current_round(state, &store, &entity, now).await?;
    let Some(updated) = store
        .record_reject(match_id, round.number, slot, now)
        .await?
    else {
        return Err(ServiceError::InvalidState(
            "a move or rejection is already recorded for this slot".into(),
        ));
    };

    let opponent = slot.opponent();

    if updated.rejected(opponent) {
        // Both participants walked away from the same round.
        let resolution = RoundResolution {
            winner: None,
            reason: RoundEndReason::Reject,
            vitals_a: None,
            vitals_b: None,
            resolved_at: now,
        };
        let _ = store
            .resolve_round(match_id, updated.number, resolution)
            .await?;

        let current = match store
            .cancel_match(match_id, CancelReason::MutualReject, now)
            .await?
        {
            Some(cancelled) => {
                info!(match_id = %match_id, "both sides rejected; match cancelled");
                sse_events::broadcast_match_cancelled(state, &cancelled);
                cancelled
            }
            None => match_service::load_match(&store, match_id).await?,
        };

        return Ok(RejectResponse {
            result: RejectResult::MatchCancelled,
            match_summary: current.into(),
        });
    }

    if updated.move_record(opponent).is_some() {
        // Opponent already moved: the decline settles the round against us.
        let resolution = RoundResolution {
            winner: Some(opponent),
            reason: RoundEndReason::Reject,
            vitals_a: None,
            vitals_b: None,
            resolved_at: now,
        };
        let conclusion = round_service::conclude_round(
            state,
            &store,
            &entity,
            updated.number,
            resolution,
            EndReason::Rounds,
            now,
        )
        .await?;

        let current = match conclusion {
            Some(RoundConclusion::MatchOver(done)) => done,
            Some(RoundConclusion::Continues(current, _)) => current,
            None => match_service::load_match(&store, match_id).await?,
        };
        return Ok(RejectResponse {
            result: RejectResult::RoundLost,
            match_summary: current.into(),
        });
    }

    // Opponent has not acted yet: the loss is committed, resolution waits
    // for their move, their decline, or the deadline.
    let current = match_service::load_match(&store, match_id).await?;
    Ok(RejectResponse {
        result: RejectResult::RoundLost,
        match_summary: current.into(),
    })
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
        dao::models::{MoveAction, MoveRecord},
        services::testing::{
            active_match, count_events, player_id, signing_key, state_with_memory_store,
        },
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use ed25519_dalek::Signer;
    use std::time::Duration;

    fn signed_forfeit(seed: u8, match_id: Uuid) -> ForfeitRequest {
        let key = signing_key(seed);
        let player = player_id(seed);
        let message = proof::forfeit_message(match_id, &player);
        let signature = key.sign(message.as_bytes());
        ForfeitRequest {
            player_id: player,
            signature: BASE64.encode(signature.to_bytes()),
        }
    }

    async fn record_strike(state: &crate::state::SharedState, match_id: Uuid, seed: u8) {
        let store = state.match_store().await.unwrap();
        let entity = store.find_match(match_id).await.unwrap().unwrap();
        let slot = entity.slot_of(&player_id(seed)).unwrap();
        store
            .record_move(
                match_id,
                1,
                slot,
                MoveRecord {
                    action: MoveAction::Strike,
                    submitted_at: crate::services::testing::test_epoch(),
                    proof: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn forfeit_awards_the_opponent() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        let response = forfeit(&state, match_id, signed_forfeit(1, match_id), now)
            .await
            .unwrap();
        assert_eq!(response.winner, player_id(2));
        assert_eq!(response.match_summary.status, MatchStatus::Completed);
        assert_eq!(response.match_summary.end_reason, Some(EndReason::Forfeit));

        assert_eq!(count_events(&mut events, "match_ended"), 1);
    }

    #[tokio::test]
    async fn forfeit_needs_a_valid_signature() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        // Signature cut for a different match does not transfer.
        let replayed = signed_forfeit(1, Uuid::new_v4());
        let result = forfeit(
            &state,
            match_id,
            ForfeitRequest {
                player_id: replayed.player_id,
                signature: replayed.signature,
            },
            now,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn forfeit_before_an_opponent_joins_is_a_conflict() {
        let (state, now) = state_with_memory_store().await;
        let summary = crate::services::match_service::create_match(
            &state,
            crate::dto::matches::CreateMatchRequest {
                player_id: player_id(1),
                best_of: None,
                stake_amount: None,
            },
            now,
        )
        .await
        .unwrap();

        let result = forfeit(&state, summary.id, signed_forfeit(1, summary.id), now).await;
        match result {
            Err(ServiceError::InvalidState(message)) => {
                assert!(message.contains("not started"), "{message}");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forfeit_on_a_completed_match_keeps_the_winner() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        forfeit(&state, match_id, signed_forfeit(1, match_id), now)
            .await
            .unwrap();

        // The loser's opponent now tries to forfeit too.
        let result = forfeit(&state, match_id, signed_forfeit(2, match_id), now).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));

        let store = state.match_store().await.unwrap();
        let entity = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(entity.winner, Some(Slot::B), "winner unchanged");
    }

    #[tokio::test]
    async fn forfeit_during_character_select_is_allowed() {
        let (state, now) = state_with_memory_store().await;
        let match_id = crate::services::testing::picked_match(&state, now).await;

        let response = forfeit(&state, match_id, signed_forfeit(2, match_id), now)
            .await
            .unwrap();
        assert_eq!(response.winner, player_id(1));
    }

    #[tokio::test]
    async fn claims_before_the_deadline_are_rejected() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        record_strike(&state, match_id, 1).await;

        let just_before = state.config().move_deadline(now) - Duration::from_millis(1);
        let result = claim_timeout(&state, match_id, &player_id(1), just_before).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));

        // The deadline itself is still not "passed".
        let at_deadline = state.config().move_deadline(now);
        let result = claim_timeout(&state, match_id, &player_id(1), at_deadline).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn expired_claim_with_only_the_claimant_moved_takes_the_round() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        record_strike(&state, match_id, 1).await;

        let just_after = state.config().move_deadline(now) + Duration::from_millis(1);
        let response = claim_timeout(&state, match_id, &player_id(1), just_after)
            .await
            .unwrap();
        assert_eq!(response.result, TimeoutClaimResult::Continue);
        assert_eq!(response.match_summary.wins_a, 1);
        assert_eq!(response.match_summary.status, MatchStatus::InProgress);

        let store = state.match_store().await.unwrap();
        assert!(store.find_round(match_id, 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_claim_can_complete_a_best_of_one() {
        let (state, now) = state_with_memory_store().await;
        let match_id =
            crate::services::testing::active_match_with_format(&state, now, 1).await;
        record_strike(&state, match_id, 2).await;

        let just_after = state.config().move_deadline(now) + Duration::from_millis(1);
        let response = claim_timeout(&state, match_id, &player_id(2), just_after)
            .await
            .unwrap();
        assert_eq!(response.result, TimeoutClaimResult::Win);
        assert_eq!(response.match_summary.status, MatchStatus::Completed);
        assert_eq!(response.match_summary.winner, Some(Slot::B));
        assert_eq!(response.match_summary.end_reason, Some(EndReason::Timeout));
    }

    #[tokio::test]
    async fn mutual_abandonment_cancels_the_match() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        let just_after = state.config().move_deadline(now) + Duration::from_millis(1);
        let response = claim_timeout(&state, match_id, &player_id(1), just_after)
            .await
            .unwrap();
        assert_eq!(response.result, TimeoutClaimResult::Cancelled);
        assert_eq!(response.match_summary.status, MatchStatus::Cancelled);
        assert_eq!(
            response.match_summary.cancel_reason,
            Some(CancelReason::MutualTimeout)
        );

        assert_eq!(count_events(&mut events, "match_cancelled"), 1);
    }

    #[tokio::test]
    async fn claims_against_a_moved_opponent_are_rejected() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        record_strike(&state, match_id, 2).await;

        let just_after = state.config().move_deadline(now) + Duration::from_millis(1);
        let result = claim_timeout(&state, match_id, &player_id(1), just_after).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn lone_reject_commits_a_round_loss_but_leaves_the_round_open() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        let response = reject(&state, match_id, &player_id(1), now).await.unwrap();
        assert_eq!(response.result, RejectResult::RoundLost);
        assert_eq!(response.match_summary.status, MatchStatus::InProgress);

        let store = state.match_store().await.unwrap();
        let round = store.find_round(match_id, 1).await.unwrap().unwrap();
        assert!(!round.is_resolved(), "round waits for the opponent to act");
    }

    #[tokio::test]
    async fn both_rejects_cancel_the_match_and_never_complete_it() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        reject(&state, match_id, &player_id(1), now).await.unwrap();
        let second = reject(&state, match_id, &player_id(2), now).await.unwrap();

        assert_eq!(second.result, RejectResult::MatchCancelled);
        assert_eq!(second.match_summary.status, MatchStatus::Cancelled);
        assert_eq!(
            second.match_summary.cancel_reason,
            Some(CancelReason::MutualReject)
        );
        assert_eq!(second.match_summary.winner, None);

        assert_eq!(count_events(&mut events, "match_cancelled"), 1);
    }

    #[tokio::test]
    async fn reject_against_a_moved_opponent_settles_immediately() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;
        record_strike(&state, match_id, 2).await;

        let response = reject(&state, match_id, &player_id(1), now).await.unwrap();
        assert_eq!(response.result, RejectResult::RoundLost);
        assert_eq!(response.match_summary.wins_b, 1);

        let store = state.match_store().await.unwrap();
        let round = store.find_round(match_id, 1).await.unwrap().unwrap();
        assert_eq!(
            round.resolution.as_ref().and_then(|r| r.winner),
            Some(Slot::B)
        );
    }

    #[tokio::test]
    async fn a_slot_can_only_act_once_per_round() {
        let (state, now) = state_with_memory_store().await;
        let match_id = active_match(&state, now).await;

        reject(&state, match_id, &player_id(1), now).await.unwrap();
        let repeat = reject(&state, match_id, &player_id(1), now).await;
        assert!(matches!(repeat, Err(ServiceError::InvalidState(_))));
    }
}
