use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoMatchDocument, MongoRoundDocument, cancel_reason_literal, character_field, doc_id,
        doc_match_id, end_reason_literal, move_doc, move_field, presence_field, rejected_field,
        resolution_doc, slot_literal, status_literal, wins_field,
    },
};
use crate::dao::{
    match_store::MatchStore,
    models::{
        CancelReason, EndReason, MatchEntity, MatchStatus, MoveRecord, RoundEntity,
        RoundResolution, Slot,
    },
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const ROUND_COLLECTION_NAME: &str = "rounds";

/// MongoDB-backed implementation of [`MatchStore`].
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// The unique `(match_id, number)` index is what makes `insert_round`
    /// idempotent under concurrent repair attempts.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let matches = database.collection::<mongodb::bson::Document>(MATCH_COLLECTION_NAME);
        let status_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_status_idx".to_owned()))
                    .build(),
            )
            .build();
        matches
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "status",
                source,
            })?;

        let rounds = database.collection::<MongoRoundDocument>(ROUND_COLLECTION_NAME);
        let round_index = mongodb::IndexModel::builder()
            .keys(doc! {"match_id": 1, "number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("round_match_number_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rounds
            .create_index(round_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROUND_COLLECTION_NAME,
                index: "match_id,number",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        self.database()
            .await
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn rounds(&self) -> Collection<MongoRoundDocument> {
        self.database()
            .await
            .collection::<MongoRoundDocument>(ROUND_COLLECTION_NAME)
    }

    /// Run one conditional match update and return the updated entity when
    /// the filter matched.
    async fn update_match(
        &self,
        operation: &'static str,
        id: Uuid,
        filter: mongodb::bson::Document,
        update: mongodb::bson::Document,
    ) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .matches()
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::MatchOp {
                operation,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    /// Run one conditional round update and return the updated entity when
    /// the filter matched.
    async fn update_round(
        &self,
        operation: &'static str,
        match_id: Uuid,
        filter: mongodb::bson::Document,
        update: mongodb::bson::Document,
    ) -> MongoResult<Option<RoundEntity>> {
        let document = self
            .rounds()
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::RoundOp {
                operation,
                match_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_round_idempotent(&self, round: RoundEntity) -> MongoResult<RoundEntity> {
        let match_id = round.match_id;
        let number = round.number;
        let collection = self.rounds().await;
        let document: MongoRoundDocument = round.into();

        match collection.insert_one(&document).await {
            Ok(_) => Ok(document.into()),
            Err(err) if is_duplicate_key(&err) => {
                let mut filter = doc_match_id(match_id);
                filter.insert("number", number as i64);
                collection
                    .find_one(filter)
                    .await
                    .map_err(|source| MongoDaoError::RoundOp {
                        operation: "insert_round.refetch",
                        match_id,
                        source,
                    })?
                    .map(Into::into)
                    .ok_or_else(|| MongoDaoError::RoundOp {
                        operation: "insert_round.refetch",
                        match_id,
                        source: err,
                    })
            }
            Err(source) => Err(MongoDaoError::RoundOp {
                operation: "insert_round",
                match_id,
                source,
            }),
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}

impl MatchStore for MongoMatchStore {
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = entity.id;
            let document: MongoMatchDocument = entity.into();
            store
                .matches()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| MongoDaoError::MatchOp {
                    operation: "create_match",
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .matches()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::MatchOp {
                    operation: "find_match",
                    id,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn join_match(
        &self,
        id: Uuid,
        player: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert("status", status_literal(MatchStatus::Waiting));
            filter.insert("player_b", mongodb::bson::Bson::Null);
            filter.insert("player_a", doc! {"$ne": player.clone()});

            let update = doc! {"$set": {
                "player_b": player,
                "status": status_literal(MatchStatus::CharacterSelect),
                "presence_b.last_seen": DateTime::from_system_time(now),
            }};

            store
                .update_match("join_match", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn set_character(
        &self,
        id: Uuid,
        slot: Slot,
        character: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert(
                "status",
                doc! {"$in": [
                    status_literal(MatchStatus::Waiting),
                    status_literal(MatchStatus::CharacterSelect),
                ]},
            );

            let mut set = mongodb::bson::Document::new();
            set.insert(character_field(slot), character);
            let update = doc! {"$set": set};

            store
                .update_match("set_character", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn activate_match(
        &self,
        id: Uuid,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert("status", status_literal(MatchStatus::CharacterSelect));
            filter.insert("character_a", doc! {"$ne": mongodb::bson::Bson::Null});
            filter.insert("character_b", doc! {"$ne": mongodb::bson::Bson::Null});
            filter.insert(
                "$or",
                vec![
                    doc! {"stake": mongodb::bson::Bson::Null},
                    doc! {"stake.confirmed": true},
                ],
            );

            let update = doc! {"$set": {
                "status": status_literal(MatchStatus::InProgress),
                "started_at": DateTime::from_system_time(started_at),
            }};

            store
                .update_match("activate_match", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn award_round_win(
        &self,
        id: Uuid,
        slot: Slot,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert("status", status_literal(MatchStatus::InProgress));

            let mut inc = mongodb::bson::Document::new();
            inc.insert(wins_field(slot), 1_i64);
            let update = doc! {"$inc": inc};

            store
                .update_match("award_round_win", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn complete_match(
        &self,
        id: Uuid,
        winner: Slot,
        reason: EndReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert(
                "status",
                doc! {"$in": [
                    status_literal(MatchStatus::CharacterSelect),
                    status_literal(MatchStatus::InProgress),
                ]},
            );

            let update = doc! {"$set": {
                "status": status_literal(MatchStatus::Completed),
                "winner": slot_literal(winner),
                "end_reason": end_reason_literal(reason),
                "completed_at": DateTime::from_system_time(completed_at),
            }};

            store
                .update_match("complete_match", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn cancel_match(
        &self,
        id: Uuid,
        reason: CancelReason,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_id(id);
            filter.insert(
                "status",
                doc! {"$in": [
                    status_literal(MatchStatus::Waiting),
                    status_literal(MatchStatus::CharacterSelect),
                    status_literal(MatchStatus::InProgress),
                ]},
            );

            let update = doc! {"$set": {
                "status": status_literal(MatchStatus::Cancelled),
                "cancel_reason": cancel_reason_literal(reason),
                "completed_at": DateTime::from_system_time(completed_at),
            }};

            store
                .update_match("cancel_match", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn set_presence(
        &self,
        id: Uuid,
        slot: Slot,
        connected: bool,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc_id(id);
            let prefix = presence_field(slot);
            let timestamp = DateTime::from_system_time(now);
            let disconnected_at = if connected {
                mongodb::bson::Bson::Null
            } else {
                mongodb::bson::Bson::DateTime(timestamp)
            };

            let mut set = mongodb::bson::Document::new();
            set.insert(format!("{prefix}.connected"), connected);
            set.insert(format!("{prefix}.last_seen"), timestamp);
            set.insert(format!("{prefix}.disconnected_at"), disconnected_at);
            let update = doc! {"$set": set};

            store
                .update_match("set_presence", id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<RoundEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_round_idempotent(round).await.map_err(Into::into) })
    }

    fn find_round(
        &self,
        match_id: Uuid,
        number: u32,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_match_id(match_id);
            filter.insert("number", number as i64);

            let document = store.rounds().await.find_one(filter).await.map_err(|source| {
                MongoDaoError::RoundOp {
                    operation: "find_round",
                    match_id,
                    source,
                }
            })?;
            Ok(document.map(Into::into))
        })
    }

    fn find_latest_round(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .rounds()
                .await
                .find_one(doc_match_id(match_id))
                .sort(doc! {"number": -1})
                .await
                .map_err(|source| MongoDaoError::RoundOp {
                    operation: "find_latest_round",
                    match_id,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn record_move(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        record: MoveRecord,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_match_id(match_id);
            filter.insert("number", number as i64);
            filter.insert("resolution", mongodb::bson::Bson::Null);
            filter.insert(move_field(slot), mongodb::bson::Bson::Null);
            filter.insert(rejected_field(slot), mongodb::bson::Bson::Null);

            let mut set = mongodb::bson::Document::new();
            set.insert(move_field(slot), move_doc(&record));
            let update = doc! {"$set": set};

            store
                .update_round("record_move", match_id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn record_reject(
        &self,
        match_id: Uuid,
        number: u32,
        slot: Slot,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_match_id(match_id);
            filter.insert("number", number as i64);
            filter.insert("resolution", mongodb::bson::Bson::Null);
            filter.insert(move_field(slot), mongodb::bson::Bson::Null);
            filter.insert(rejected_field(slot), mongodb::bson::Bson::Null);

            let mut set = mongodb::bson::Document::new();
            set.insert(rejected_field(slot), DateTime::from_system_time(at));
            let update = doc! {"$set": set};

            store
                .update_round("record_reject", match_id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn resolve_round(
        &self,
        match_id: Uuid,
        number: u32,
        resolution: RoundResolution,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = doc_match_id(match_id);
            filter.insert("number", number as i64);
            filter.insert("resolution", mongodb::bson::Bson::Null);

            let update = doc! {"$set": {"resolution": resolution_doc(&resolution)}};

            store
                .update_round("resolve_round", match_id, filter, update)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }
}
