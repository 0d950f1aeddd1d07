pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    CancelReason, EndReason, MatchEntity, MoveRecord, RoundEntity, RoundResolution, Slot,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for match and round records.
///
/// Every lifecycle transition is a *conditional* write: the method only takes
/// effect when the stored record still satisfies the documented guard, and
/// returns `None` when it does not. A `None` is not an error; it is the
/// signal that a concurrent request already performed the transition (or the
/// record is in another state), and the caller must re-read and answer
/// consistently instead of retrying the write.
pub trait MatchStore: Send + Sync {
    /// Insert a freshly created match record.
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch a match by id.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Fill slot B and advance `Waiting -> CharacterSelect`.
    ///
    /// Guard: status is `Waiting`, slot B is empty, and `player` is not
    /// already the host.
    fn join_match(
        &self,
        id: Uuid,
        player: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Persist `slot`'s character pick, overwriting any previous pick.
    ///
    /// Guard: status is pre-activation. The overwrite itself is idempotent.
    fn set_character(
        &self,
        id: Uuid,
        slot: Slot,
        character: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// The single activation primitive: `CharacterSelect -> InProgress`.
    ///
    /// Guard: status is `CharacterSelect`, both picks present, and the stake
    /// gate (when staked) is confirmed. Exactly one of any number of
    /// concurrent callers observes `Some`; the rest must re-read.
    fn activate_match(
        &self,
        id: Uuid,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Increment `slot`'s round-win tally.
    ///
    /// Guard: status is `InProgress`.
    fn award_round_win(
        &self,
        id: Uuid,
        slot: Slot,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Terminate the match with a winner.
    ///
    /// Guard: status is `CharacterSelect` or `InProgress` (the statuses from
    /// which a completion is legal).
    fn complete_match(
        &self,
        id: Uuid,
        winner: Slot,
        reason: EndReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Terminate the match without a winner.
    ///
    /// Guard: status is non-terminal.
    fn cancel_match(
        &self,
        id: Uuid,
        reason: CancelReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Record a presence transition for `slot`. Idempotent.
    fn set_presence(
        &self,
        id: Uuid,
        slot: Slot,
        connected: bool,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Insert a round, keeping the existing record when `(match_id, number)`
    /// already exists. Returns the stored round either way, which makes the
    /// lazy round-1 repair path safe to run concurrently.
    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<RoundEntity>>;

    /// Fetch one round of a match.
    fn find_round(
        &self,
        match_id: Uuid,
        number: u32,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;

    /// Fetch the highest-numbered round of a match, if any.
    fn find_latest_round(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;

    /// Record `slot`'s move for a round.
    ///
    /// Guard: the round is unresolved and `slot` has neither moved nor
    /// rejected. At most one move per slot per round.
    fn record_move(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        record: MoveRecord,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;

    /// Record `slot`'s explicit decline to move.
    ///
    /// Guard: the round is unresolved and `slot` has neither moved nor
    /// rejected.
    fn record_reject(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;

    /// Conclude a round exactly once.
    ///
    /// Guard: the round is unresolved. This is the race guard shared by
    /// combat outcomes, timeout claims, and reject resolution.
    fn resolve_round(
        &self,
        match_id: Uuid,
        number: u32,
        resolution: RoundResolution,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;

    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish backend connectivity after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
