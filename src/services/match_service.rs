use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{CancelReason, MatchEntity, StakeEntity},
    },
    dto::{common::MatchSummary, matches::CreateMatchRequest},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Open a fresh match in `waiting` on behalf of the room collaborator.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
    now: SystemTime,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;

    let best_of = request
        .best_of
        .unwrap_or_else(|| state.config().default_best_of());
    if best_of == 0 || best_of % 2 == 0 || best_of > 9 {
        return Err(ServiceError::InvalidInput(format!(
            "best_of must be an odd number between 1 and 9 (got {best_of})"
        )));
    }

    let stake = request.stake_amount.map(|amount| StakeEntity {
        amount,
        deposit_a: None,
        deposit_b: None,
        confirmed: false,
        deposit_deadline: state.config().stake_deadline(now),
    });

    let entity = MatchEntity::create(Uuid::new_v4(), request.player_id, best_of, stake, now);
    store.create_match(entity.clone()).await?;

    info!(match_id = %entity.id, best_of, staked = entity.stake.is_some(), "match created");
    Ok(entity.into())
}

/// Fill slot B, advancing the match into character selection.
pub async fn join_match(
    state: &SharedState,
    match_id: Uuid,
    player_id: String,
    now: SystemTime,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = load_match(&store, match_id).await?;
    let entity = expire_stake_if_due(state, &store, entity, now).await?;

    if entity.player_a == player_id {
        return Err(ServiceError::InvalidInput(
            "host cannot join their own match".into(),
        ));
    }

    if let Some(joined) = store.join_match(match_id, player_id.clone(), now).await? {
        info!(match_id = %match_id, "opponent joined");
        return Ok(joined.into());
    }

    // The guard failed: either this player already holds slot B (a retried
    // request) or someone else got there first.
    let current = load_match(&store, match_id).await?;
    if current.player_b.as_deref() == Some(player_id.as_str()) {
        return Ok(current.into());
    }
    Err(ServiceError::InvalidState(
        "match is not open for joining".into(),
    ))
}

/// Read-only match projection.
pub async fn get_match(
    state: &SharedState,
    match_id: Uuid,
    now: SystemTime,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = load_match(&store, match_id).await?;
    let entity = expire_stake_if_due(state, &store, entity, now).await?;
    Ok(entity.into())
}

/// Fetch a match or fail with a not-found error.
pub(crate) async fn load_match(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))
}

/// Lazily cancel a pre-activation match whose stake deposit window has
/// expired without confirmation. Deadlines are data; whichever request
/// notices first performs the transition.
pub(crate) async fn expire_stake_if_due(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: MatchEntity,
    now: SystemTime,
) -> Result<MatchEntity, ServiceError> {
    if !entity.status.is_pre_activation() || !entity.stake_window_expired(now) {
        return Ok(entity);
    }

    match store
        .cancel_match(entity.id, CancelReason::StakeExpired, now)
        .await?
    {
        Some(cancelled) => {
            info!(match_id = %entity.id, "stake window expired; match cancelled");
            sse_events::broadcast_match_cancelled(state, &cancelled);
            Ok(cancelled)
        }
        // Another request already performed a transition; its state wins.
        None => load_match(store, entity.id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::MatchStatus;
    use crate::services::testing::{player_id, staked_match_request, state_with_memory_store};

    #[tokio::test]
    async fn create_then_join_reaches_character_select() {
        let (state, now) = state_with_memory_store().await;

        let summary = create_match(
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
        assert_eq!(summary.status, MatchStatus::Waiting);
        assert_eq!(summary.best_of, 3);

        let joined = join_match(&state, summary.id, player_id(2), now)
            .await
            .unwrap();
        assert_eq!(joined.status, MatchStatus::CharacterSelect);
        assert_eq!(joined.player_b, Some(player_id(2)));
    }

    #[tokio::test]
    async fn join_is_idempotent_for_the_same_player() {
        let (state, now) = state_with_memory_store().await;
        let summary = create_match(
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

        join_match(&state, summary.id, player_id(2), now)
            .await
            .unwrap();
        let again = join_match(&state, summary.id, player_id(2), now)
            .await
            .unwrap();
        assert_eq!(again.player_b, Some(player_id(2)));

        let third = join_match(&state, summary.id, player_id(3), now).await;
        assert!(matches!(third, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn even_format_is_rejected() {
        let (state, now) = state_with_memory_store().await;
        let result = create_match(
            &state,
            CreateMatchRequest {
                player_id: player_id(1),
                best_of: Some(4),
                stake_amount: None,
            },
            now,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn host_cannot_join_own_match() {
        let (state, now) = state_with_memory_store().await;
        let summary = create_match(
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

        let result = join_match(&state, summary.id, player_id(1), now).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn expired_stake_window_cancels_on_next_read() {
        let (state, now) = state_with_memory_store().await;
        let summary = create_match(&state, staked_match_request(1, 500), now)
            .await
            .unwrap();

        // Before the deadline, the match is still waiting.
        let fresh = get_match(&state, summary.id, now).await.unwrap();
        assert_eq!(fresh.status, MatchStatus::Waiting);

        let past_window = state.config().stake_deadline(now) + std::time::Duration::from_millis(1);
        let expired = get_match(&state, summary.id, past_window).await.unwrap();
        assert_eq!(expired.status, MatchStatus::Cancelled);
        assert_eq!(
            expired.cancel_reason,
            Some(CancelReason::StakeExpired),
            "cancellation carries the stake reason"
        );
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let (state, now) = state_with_memory_store().await;
        let result = get_match(&state, Uuid::new_v4(), now).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
