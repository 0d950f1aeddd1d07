//! Shared fixtures for service tests, all running against the in-memory
//! reference backend.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use ed25519_dalek::SigningKey;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::match_store::memory::InMemoryMatchStore,
    dto::{matches::CreateMatchRequest, selection::SubmitSelectionRequest},
    services::{match_service, selection_service},
    state::{AppState, SharedState},
};

/// Fixed wall-clock origin so deadline arithmetic is deterministic.
pub fn test_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Fresh application state backed by the in-memory store.
pub async fn state_with_memory_store() -> (SharedState, SystemTime) {
    let state = AppState::new(AppConfig::default());
    state
        .set_match_store(Arc::new(InMemoryMatchStore::new()))
        .await;
    (state, test_epoch())
}

/// Deterministic signing key for seed `seed`.
pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// The player id (hex-encoded public key) for seed `seed`.
pub fn player_id(seed: u8) -> String {
    signing_key(seed)
        .verifying_key()
        .as_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Create-match payload carrying a stake.
pub fn staked_match_request(seed: u8, amount: u64) -> CreateMatchRequest {
    CreateMatchRequest {
        player_id: player_id(seed),
        best_of: None,
        stake_amount: Some(amount),
    }
}

/// Create a best-of-3 match between players 1 and 2, with both picks made
/// but nothing confirmed.
pub async fn picked_match(state: &SharedState, now: SystemTime) -> Uuid {
    picked_match_with_format(state, now, 3).await
}

/// Like [`picked_match`] with an explicit format.
pub async fn picked_match_with_format(
    state: &SharedState,
    now: SystemTime,
    best_of: u32,
) -> Uuid {
    let summary = match_service::create_match(
        state,
        CreateMatchRequest {
            player_id: player_id(1),
            best_of: Some(best_of),
            stake_amount: None,
        },
        now,
    )
    .await
    .unwrap();
    match_service::join_match(state, summary.id, player_id(2), now)
        .await
        .unwrap();

    for (seed, character) in [(1, "razor"), (2, "bulwark")] {
        selection_service::submit_selection(
            state,
            summary.id,
            SubmitSelectionRequest {
                player_id: player_id(seed),
                character_id: character.into(),
                confirm: false,
            },
            now,
        )
        .await
        .unwrap();
    }

    summary.id
}

/// Create and activate a match between players 1 (razor) and 2 (bulwark).
pub async fn active_match(state: &SharedState, now: SystemTime) -> Uuid {
    active_match_with_format(state, now, 3).await
}

/// Like [`active_match`] with an explicit format.
pub async fn active_match_with_format(
    state: &SharedState,
    now: SystemTime,
    best_of: u32,
) -> Uuid {
    let match_id = picked_match_with_format(state, now, best_of).await;

    for seed in [1, 2] {
        let character = if seed == 1 { "razor" } else { "bulwark" };
        selection_service::submit_selection(
            state,
            match_id,
            SubmitSelectionRequest {
                player_id: player_id(seed),
                character_id: character.into(),
                confirm: true,
            },
            now,
        )
        .await
        .unwrap();
    }

    match_id
}

/// Drain every buffered event from `receiver` and count those named `event`.
pub fn count_events(
    receiver: &mut tokio::sync::broadcast::Receiver<crate::dto::sse::ServerEvent>,
    event: &str,
) -> usize {
    let mut count = 0;
    while let Ok(received) = receiver.try_recv() {
        if received.event.as_deref() == Some(event) {
            count += 1;
        }
    }
    count
}
