use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchStatus, Slot},
    dto::selection::{SelectionResponse, SelectionStateResponse, SubmitSelectionRequest},
    error::ServiceError,
    services::{match_service, round_service, sse_events},
    state::SharedState,
};

/// Persist (and optionally confirm) a character pick.
///
/// Activation is race-safe: when both picks are present, every confirming
/// caller funnels into the store's single conditional `activate_match`
/// primitive. The one caller whose conditional write takes effect creates
/// round 1 and broadcasts; every other caller detects the lost race,
/// re-reads, and returns the same `match_ready = true` response, so its
/// client can proceed even if it never receives the broadcast. There is no
/// separate fast path for "already selected, re-confirming": that flow goes
/// through the same primitive and lands in the lost-race branch.
pub async fn submit_selection(
    state: &SharedState,
    match_id: Uuid,
    request: SubmitSelectionRequest,
    now: SystemTime,
) -> Result<SelectionResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let entity = match_service::expire_stake_if_due(state, &store, entity, now).await?;

    let slot = participant_slot(&entity, &request.player_id)?;

    if state.config().character(&request.character_id).is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "unknown character id `{}`",
            request.character_id
        )));
    }

    if !entity.status.is_pre_activation() {
        let response = already_active_response(&entity, slot, &request)?;
        sse_events::broadcast_character_selected(
            state,
            match_id,
            slot,
            &request.character_id,
            true,
        );
        return Ok(response);
    }

    let updated = match store
        .set_character(match_id, slot, request.character_id.clone())
        .await?
    {
        Some(updated) => updated,
        // The status flipped between our read and the write; answer from
        // whatever the store now says.
        None => {
            let current = match_service::load_match(&store, match_id).await?;
            let response = already_active_response(&current, slot, &request)?;
            sse_events::broadcast_character_selected(
                state,
                match_id,
                slot,
                &request.character_id,
                true,
            );
            return Ok(response);
        }
    };

    if !request.confirm {
        return Ok(SelectionResponse {
            is_confirmed: false,
            opponent_ready: updated.character(slot.opponent()).is_some(),
            match_ready: false,
            player_a_character: None,
            player_b_character: None,
            status: updated.status,
        });
    }

    let both_ready = updated.character(slot.opponent()).is_some();
    sse_events::broadcast_character_selected(
        state,
        match_id,
        slot,
        &request.character_id,
        both_ready,
    );

    if !both_ready {
        return Ok(SelectionResponse {
            is_confirmed: true,
            opponent_ready: false,
            match_ready: false,
            player_a_character: None,
            player_b_character: None,
            status: updated.status,
        });
    }

    match store.activate_match(match_id, now).await? {
        Some(active) => {
            info!(match_id = %match_id, "match activated");
            let round = round_service::open_round(state, &store, &active, 1, now).await?;
            sse_events::broadcast_match_starting(state, &active, state.config().start_at(now));
            let (fighter_a, fighter_b) = round_service::base_fighter_states(state, &active);
            sse_events::broadcast_round_starting(
                state,
                match_id,
                round.number,
                round.move_deadline,
                fighter_a,
                fighter_b,
            );
            Ok(ready_response(&active))
        }
        None => {
            let current = match_service::load_match(&store, match_id).await?;
            match current.status {
                // Lost the race: the opponent's confirm already activated the
                // match (or it even completed). Same successful shape.
                MatchStatus::InProgress | MatchStatus::Completed => Ok(ready_response(&current)),
                // Guard held because the stake is not confirmed yet.
                MatchStatus::CharacterSelect => Ok(SelectionResponse {
                    is_confirmed: true,
                    opponent_ready: true,
                    match_ready: false,
                    player_a_character: None,
                    player_b_character: None,
                    status: current.status,
                }),
                MatchStatus::Waiting | MatchStatus::Cancelled => Err(ServiceError::InvalidState(
                    "match is no longer in character selection".into(),
                )),
            }
        }
    }
}

/// Read-only selection state for one participant.
pub async fn selection_state(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
    now: SystemTime,
) -> Result<SelectionStateResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = match_service::load_match(&store, match_id).await?;
    let entity = match_service::expire_stake_if_due(state, &store, entity, now).await?;

    let slot = participant_slot(&entity, player_id)?;

    Ok(SelectionStateResponse {
        own_character: entity.character(slot).map(str::to_string),
        opponent_character: entity.character(slot.opponent()).map(str::to_string),
        status: entity.status,
        match_ready: matches!(
            entity.status,
            MatchStatus::InProgress | MatchStatus::Completed
        ),
    })
}

fn participant_slot(entity: &MatchEntity, player_id: &str) -> Result<Slot, ServiceError> {
    entity.slot_of(player_id).ok_or_else(|| {
        ServiceError::Forbidden("requester is not a participant of this match".into())
    })
}

/// Answer a selection call that arrived after the match left the selection
/// phase. A re-confirm of the already-persisted pick is a success (the
/// client just missed the broadcast); anything else is a conflict.
fn already_active_response(
    entity: &MatchEntity,
    slot: Slot,
    request: &SubmitSelectionRequest,
) -> Result<SelectionResponse, ServiceError> {
    let same_pick = entity.character(slot) == Some(request.character_id.as_str());
    if request.confirm
        && same_pick
        && matches!(
            entity.status,
            MatchStatus::InProgress | MatchStatus::Completed
        )
    {
        return Ok(ready_response(entity));
    }

    Err(ServiceError::InvalidState(
        "selection phase is over for this match".into(),
    ))
}

fn ready_response(entity: &MatchEntity) -> SelectionResponse {
    SelectionResponse {
        is_confirmed: true,
        opponent_ready: true,
        match_ready: true,
        player_a_character: entity.character_a.clone(),
        player_b_character: entity.character_b.clone(),
        status: entity.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{MatchEntity, StakeEntity},
        dto::matches::CreateMatchRequest,
        services::testing::{
            count_events, picked_match, player_id, state_with_memory_store,
        },
    };

    fn select(seed: u8, character: &str, confirm: bool) -> SubmitSelectionRequest {
        SubmitSelectionRequest {
            player_id: player_id(seed),
            character_id: character.into(),
            confirm,
        }
    }

    #[tokio::test]
    async fn sequential_confirms_activate_exactly_once() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        let first = submit_selection(&state, match_id, select(1, "razor", true), now)
            .await
            .unwrap();
        assert!(first.is_confirmed);
        assert!(first.match_ready, "both picks were present before confirm");

        let second = submit_selection(&state, match_id, select(2, "bulwark", true), now)
            .await
            .unwrap();
        assert!(second.match_ready);
        assert_eq!(second.player_a_character.as_deref(), Some("razor"));
        assert_eq!(second.player_b_character.as_deref(), Some("bulwark"));

        assert_eq!(count_events(&mut events, "match_starting"), 1);
    }

    #[tokio::test]
    async fn concurrent_confirms_publish_one_start_and_agree() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;
        let mut events = state.bus().subscribe(match_id);

        let (first, second) = tokio::join!(
            submit_selection(&state, match_id, select(1, "razor", true), now),
            submit_selection(&state, match_id, select(2, "bulwark", true), now),
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(first.match_ready && second.match_ready);
        assert_eq!(first.player_a_character, second.player_a_character);
        assert_eq!(first.player_b_character, second.player_b_character);
        assert_eq!(first.player_a_character.as_deref(), Some("razor"));

        assert_eq!(count_events(&mut events, "match_starting"), 1);

        let store = state.match_store().await.unwrap();
        let round = store.find_round(match_id, 1).await.unwrap();
        assert!(round.is_some(), "activation created round 1");
    }

    #[tokio::test]
    async fn resubmitting_a_pick_overwrites_idempotently() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;

        submit_selection(&state, match_id, select(1, "wisp", false), now)
            .await
            .unwrap();
        let again = submit_selection(&state, match_id, select(1, "wisp", false), now)
            .await
            .unwrap();
        assert!(!again.is_confirmed);
        assert!(!again.match_ready);

        let store = state.match_store().await.unwrap();
        let entity = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(entity.character_a.as_deref(), Some("wisp"));
        assert_eq!(entity.status, MatchStatus::CharacterSelect);
    }

    #[tokio::test]
    async fn unknown_character_is_rejected() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;

        let result = submit_selection(&state, match_id, select(1, "nobody", true), now).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn outsiders_are_forbidden() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;

        let result = submit_selection(&state, match_id, select(9, "razor", true), now).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn reconfirm_after_activation_reports_ready() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;

        submit_selection(&state, match_id, select(1, "razor", true), now)
            .await
            .unwrap();

        // The same player confirms again after the match went live.
        let again = submit_selection(&state, match_id, select(1, "razor", true), now)
            .await
            .unwrap();
        assert!(again.match_ready);
        assert_eq!(again.status, MatchStatus::InProgress);

        // Changing the pick after activation is a conflict.
        let conflict = submit_selection(&state, match_id, select(1, "wisp", true), now).await;
        assert!(matches!(conflict, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn unconfirmed_stake_blocks_activation() {
        let (state, now) = state_with_memory_store().await;
        let store = state.match_store().await.unwrap();

        let mut entity = MatchEntity::create(uuid::Uuid::new_v4(), player_id(1), 3, None, now);
        entity.player_b = Some(player_id(2));
        entity.status = MatchStatus::CharacterSelect;
        entity.stake = Some(StakeEntity {
            amount: 500,
            deposit_a: None,
            deposit_b: None,
            confirmed: false,
            deposit_deadline: state.config().stake_deadline(now),
        });
        let match_id = entity.id;
        store.create_match(entity).await.unwrap();

        submit_selection(&state, match_id, select(1, "razor", false), now)
            .await
            .unwrap();
        submit_selection(&state, match_id, select(2, "bulwark", false), now)
            .await
            .unwrap();

        let blocked = submit_selection(&state, match_id, select(1, "razor", true), now)
            .await
            .unwrap();
        assert!(blocked.is_confirmed);
        assert!(blocked.opponent_ready);
        assert!(!blocked.match_ready, "stake gate keeps the match unstarted");
        assert_eq!(blocked.status, MatchStatus::CharacterSelect);
    }

    #[tokio::test]
    async fn confirmed_stake_allows_activation() {
        let (state, now) = state_with_memory_store().await;
        let store = state.match_store().await.unwrap();

        let mut entity = MatchEntity::create(uuid::Uuid::new_v4(), player_id(1), 3, None, now);
        entity.player_b = Some(player_id(2));
        entity.status = MatchStatus::CharacterSelect;
        entity.stake = Some(StakeEntity {
            amount: 500,
            deposit_a: Some("tx-a".into()),
            deposit_b: Some("tx-b".into()),
            confirmed: true,
            deposit_deadline: state.config().stake_deadline(now),
        });
        let match_id = entity.id;
        store.create_match(entity).await.unwrap();

        submit_selection(&state, match_id, select(1, "razor", false), now)
            .await
            .unwrap();
        let ready = submit_selection(&state, match_id, select(2, "bulwark", true), now)
            .await
            .unwrap();
        assert!(ready.match_ready);
        assert_eq!(ready.status, MatchStatus::InProgress);
    }

    #[tokio::test]
    async fn selection_state_reports_both_sides() {
        let (state, now) = state_with_memory_store().await;
        let match_id = picked_match(&state, now).await;

        let view = selection_state(&state, match_id, &player_id(2), now)
            .await
            .unwrap();
        assert_eq!(view.own_character.as_deref(), Some("bulwark"));
        assert_eq!(view.opponent_character.as_deref(), Some("razor"));
        assert!(!view.match_ready);
    }

    #[tokio::test]
    async fn selection_on_waiting_match_reports_not_ready() {
        let (state, now) = state_with_memory_store().await;
        let summary = crate::services::match_service::create_match(
            &state,
            CreateMatchRequest {
                player_id: player_id(1),
                best_of: None,
                stake_amount: None,
            },
            now,
        )
        .await
        .unwrap();

        let response = submit_selection(&state, summary.id, select(1, "razor", true), now)
            .await
            .unwrap();
        assert!(response.is_confirmed);
        assert!(!response.opponent_ready);
        assert!(!response.match_ready);
        assert_eq!(response.status, MatchStatus::Waiting);
    }
}
