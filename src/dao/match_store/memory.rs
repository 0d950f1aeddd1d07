//! In-process reference backend.
//!
//! Implements the exact conditional-write semantics of [`MatchStore`] on top
//! of sharded maps. Each mutation holds the map entry for the duration of the
//! check-and-write, which gives the same at-most-once transition guarantee
//! the MongoDB backend gets from filtered updates. Used by the test suite and
//! selectable for local development via `MATCH_STORE=memory`.

use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use uuid::Uuid;

use crate::dao::{
    match_store::MatchStore,
    models::{
        CancelReason, EndReason, MatchEntity, MatchStatus, MoveRecord, RoundEntity,
        RoundResolution, Slot,
    },
    storage::StorageResult,
};

/// Cheap-to-clone in-memory implementation of [`MatchStore`].
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    matches: DashMap<Uuid, MatchEntity>,
    rounds: DashMap<Uuid, BTreeMap<u32, RoundEntity>>,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `mutate` to the match while holding its entry; `mutate` returns
    /// `None` to signal a failed guard.
    fn with_match<F>(&self, id: Uuid, mutate: F) -> Option<MatchEntity>
    where
        F: FnOnce(&mut MatchEntity) -> Option<()>,
    {
        let mut entry = self.inner.matches.get_mut(&id)?;
        mutate(entry.value_mut())?;
        Some(entry.value().clone())
    }

    /// Apply `mutate` to one round while holding the match's round map.
    fn with_round<F>(&self, match_id: Uuid, number: u32, mutate: F) -> Option<RoundEntity>
    where
        F: FnOnce(&mut RoundEntity) -> Option<()>,
    {
        let mut entry = self.inner.rounds.get_mut(&match_id)?;
        let round = entry.value_mut().get_mut(&number)?;
        mutate(round)?;
        Some(round.clone())
    }
}

fn done<T: Send + 'static>(value: T) -> BoxFuture<'static, T> {
    future::ready(value).boxed()
}

impl MatchStore for InMemoryMatchStore {
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.matches.insert(entity.id, entity);
        done(Ok(()))
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let found = self.inner.matches.get(&id).map(|entry| entry.clone());
        done(Ok(found))
    }

    fn join_match(
        &self,
        id: Uuid,
        player: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if entity.status != MatchStatus::Waiting
                || entity.player_b.is_some()
                || entity.player_a == player
            {
                return None;
            }
            entity.player_b = Some(player);
            entity.status = MatchStatus::CharacterSelect;
            entity.presence_b.last_seen = now;
            Some(())
        });
        done(Ok(updated))
    }

    fn set_character(
        &self,
        id: Uuid,
        slot: Slot,
        character: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if !entity.status.is_pre_activation() {
                return None;
            }
            match slot {
                Slot::A => entity.character_a = Some(character),
                Slot::B => entity.character_b = Some(character),
            }
            Some(())
        });
        done(Ok(updated))
    }

    fn activate_match(
        &self,
        id: Uuid,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if entity.status != MatchStatus::CharacterSelect
                || !entity.both_characters_picked()
                || !entity.stake_gate_open()
            {
                return None;
            }
            entity.status = MatchStatus::InProgress;
            entity.started_at = Some(started_at);
            Some(())
        });
        done(Ok(updated))
    }

    fn award_round_win(
        &self,
        id: Uuid,
        slot: Slot,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if entity.status != MatchStatus::InProgress {
                return None;
            }
            match slot {
                Slot::A => entity.wins_a += 1,
                Slot::B => entity.wins_b += 1,
            }
            Some(())
        });
        done(Ok(updated))
    }

    fn complete_match(
        &self,
        id: Uuid,
        winner: Slot,
        reason: EndReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if !matches!(
                entity.status,
                MatchStatus::CharacterSelect | MatchStatus::InProgress
            ) {
                return None;
            }
            entity.status = MatchStatus::Completed;
            entity.winner = Some(winner);
            entity.end_reason = Some(reason);
            entity.completed_at = Some(completed_at);
            Some(())
        });
        done(Ok(updated))
    }

    fn cancel_match(
        &self,
        id: Uuid,
        reason: CancelReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            if entity.status.is_terminal() {
                return None;
            }
            entity.status = MatchStatus::Cancelled;
            entity.cancel_reason = Some(reason);
            entity.completed_at = Some(completed_at);
            Some(())
        });
        done(Ok(updated))
    }

    fn set_presence(
        &self,
        id: Uuid,
        slot: Slot,
        connected: bool,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let updated = self.with_match(id, |entity| {
            let presence = match slot {
                Slot::A => &mut entity.presence_a,
                Slot::B => &mut entity.presence_b,
            };
            presence.connected = connected;
            presence.last_seen = now;
            presence.disconnected_at = if connected { None } else { Some(now) };
            Some(())
        });
        done(Ok(updated))
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<RoundEntity>> {
        let mut entry = self.inner.rounds.entry(round.match_id).or_default();
        let stored = entry
            .value_mut()
            .entry(round.number)
            .or_insert(round)
            .clone();
        drop(entry);
        done(Ok(stored))
    }

    fn find_round(
        &self,
        match_id: Uuid,
        number: u32,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let found = self
            .inner
            .rounds
            .get(&match_id)
            .and_then(|entry| entry.get(&number).cloned());
        done(Ok(found))
    }

    fn find_latest_round(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let found = self
            .inner
            .rounds
            .get(&match_id)
            .and_then(|entry| entry.values().next_back().cloned());
        done(Ok(found))
    }

    fn record_move(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        record: MoveRecord,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let updated = self.with_round(match_id, number, |round| {
            if round.is_resolved() || round.acted(slot) {
                return None;
            }
            match slot {
                Slot::A => round.move_a = Some(record),
                Slot::B => round.move_b = Some(record),
            }
            Some(())
        });
        done(Ok(updated))
    }

    fn record_reject(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let updated = self.with_round(match_id, number, |round| {
            if round.is_resolved() || round.acted(slot) {
                return None;
            }
            match slot {
                Slot::A => round.rejected_a = Some(at),
                Slot::B => round.rejected_b = Some(at),
            }
            Some(())
        });
        done(Ok(updated))
    }

    fn resolve_round(
        &self,
        match_id: Uuid,
        number: u32,
        resolution: RoundResolution,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let updated = self.with_round(match_id, number, |round| {
            if round.is_resolved() {
                return None;
            }
            round.resolution = Some(resolution);
            Some(())
        });
        done(Ok(updated))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        done(Ok(()))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        done(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{MoveAction, RoundEndReason};
    use std::time::Duration;

    fn seeded_match(store: &InMemoryMatchStore) -> Uuid {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let id = Uuid::new_v4();
        let entity = MatchEntity::create(id, "a".repeat(64), 3, None, now);
        futures::executor::block_on(store.create_match(entity)).unwrap();
        id
    }

    #[test]
    fn join_is_conditional_on_waiting() {
        let store = InMemoryMatchStore::new();
        let id = seeded_match(&store);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_001);

        let joined =
            futures::executor::block_on(store.join_match(id, "b".repeat(64), now)).unwrap();
        assert_eq!(joined.unwrap().status, MatchStatus::CharacterSelect);

        // A second opponent loses the guard.
        let second =
            futures::executor::block_on(store.join_match(id, "c".repeat(64), now)).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn host_cannot_fill_both_slots() {
        let store = InMemoryMatchStore::new();
        let id = seeded_match(&store);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_001);

        let joined =
            futures::executor::block_on(store.join_match(id, "a".repeat(64), now)).unwrap();
        assert!(joined.is_none());
    }

    #[test]
    fn activation_happens_at_most_once() {
        let store = InMemoryMatchStore::new();
        let id = seeded_match(&store);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_001);

        futures::executor::block_on(store.join_match(id, "b".repeat(64), now))
            .unwrap()
            .unwrap();
        futures::executor::block_on(store.set_character(id, Slot::A, "razor".into()))
            .unwrap()
            .unwrap();
        futures::executor::block_on(store.set_character(id, Slot::B, "bulwark".into()))
            .unwrap()
            .unwrap();

        let first = futures::executor::block_on(store.activate_match(id, now)).unwrap();
        let second = futures::executor::block_on(store.activate_match(id, now)).unwrap();

        assert_eq!(first.unwrap().status, MatchStatus::InProgress);
        assert!(second.is_none(), "second activation must lose the guard");
    }

    #[test]
    fn activation_requires_both_picks() {
        let store = InMemoryMatchStore::new();
        let id = seeded_match(&store);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_001);

        futures::executor::block_on(store.join_match(id, "b".repeat(64), now))
            .unwrap()
            .unwrap();
        futures::executor::block_on(store.set_character(id, Slot::A, "razor".into()))
            .unwrap()
            .unwrap();

        let activated = futures::executor::block_on(store.activate_match(id, now)).unwrap();
        assert!(activated.is_none());
    }

    #[test]
    fn insert_round_is_idempotent() {
        let store = InMemoryMatchStore::new();
        let match_id = Uuid::new_v4();
        let deadline = SystemTime::UNIX_EPOCH + Duration::from_secs(30);

        let first = futures::executor::block_on(
            store.insert_round(RoundEntity::open(match_id, 1, deadline)),
        )
        .unwrap();
        let second = futures::executor::block_on(store.insert_round(RoundEntity::open(
            match_id,
            1,
            deadline + Duration::from_secs(99),
        )))
        .unwrap();

        assert_eq!(first.move_deadline, deadline);
        assert_eq!(second.move_deadline, deadline, "existing round kept");
    }

    #[test]
    fn one_move_per_slot_per_round() {
        let store = InMemoryMatchStore::new();
        let match_id = Uuid::new_v4();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        futures::executor::block_on(store.insert_round(RoundEntity::open(
            match_id,
            1,
            at + Duration::from_secs(23),
        )))
        .unwrap();

        let record = MoveRecord {
            action: MoveAction::Strike,
            submitted_at: at,
            proof: None,
        };
        let first = futures::executor::block_on(store.record_move(
            match_id,
            1,
            Slot::A,
            record.clone(),
        ))
        .unwrap();
        let second =
            futures::executor::block_on(store.record_move(match_id, 1, Slot::A, record)).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn resolve_round_wins_exactly_once() {
        let store = InMemoryMatchStore::new();
        let match_id = Uuid::new_v4();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        futures::executor::block_on(store.insert_round(RoundEntity::open(match_id, 1, at)))
            .unwrap();

        let resolution = RoundResolution {
            winner: Some(Slot::A),
            reason: RoundEndReason::Timeout,
            vitals_a: None,
            vitals_b: None,
            resolved_at: at,
        };
        let first = futures::executor::block_on(store.resolve_round(
            match_id,
            1,
            resolution.clone(),
        ))
        .unwrap();
        let second =
            futures::executor::block_on(store.resolve_round(match_id, 1, resolution)).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }
}
