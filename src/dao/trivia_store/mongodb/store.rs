use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPlayerDocument, MongoQuestionDocument, doc_id},
};
use crate::dao::{
    models::{BankRecordEntity, PlayerEntity},
    storage::StorageResult,
    trivia_store::{PlayerLedger, QuestionBank, TriviaStore},
};

const PLAYER_COLLECTION_NAME: &str = "players";
const QUESTION_COLLECTION_NAME: &str = "questions";

/// Player ledger and question bank backed by MongoDB.
#[derive(Clone)]
pub struct MongoTriviaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoTriviaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.players().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"points": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_points_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "points",
                source,
            })?;

        Ok(())
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<MongoQuestionDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME)
    }

    async fn get_player(&self, id: String) -> MongoResult<Option<PlayerEntity>> {
        let collection = self.players().await;
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn create_player(&self, player: PlayerEntity) -> MongoResult<PlayerEntity> {
        let collection = self.players().await;
        let id = player.id.clone();
        let stored = collection
            .find_one_and_update(
                doc_id(&id),
                doc! {"$setOnInsert": {"name": player.name.as_str(), "points": player.points}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: id.clone(),
                source,
            })?;
        Ok(stored.map(Into::into).unwrap_or(player))
    }

    async fn update_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let collection = self.players().await;
        let id = player.id.clone();
        let document: MongoPlayerDocument = player.into();
        collection
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { id, source })?;
        Ok(())
    }

    async fn top_players(&self, limit: usize) -> MongoResult<Vec<PlayerEntity>> {
        let collection = self.players().await;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let documents: Vec<MongoPlayerDocument> = collection
            .find(doc! {})
            .sort(doc! {"points": -1, "_id": 1})
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::RankPlayers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::RankPlayers { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn sample(&self, count: usize) -> MongoResult<Vec<BankRecordEntity>> {
        let collection = self.questions().await;
        let size = i64::try_from(count).unwrap_or(i64::MAX);
        let documents: Vec<MongoQuestionDocument> = collection
            .aggregate([doc! {"$sample": {"size": size}}])
            .with_type::<MongoQuestionDocument>()
            .await
            .map_err(|source| MongoDaoError::SampleQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::SampleQuestions { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl PlayerLedger for MongoTriviaStore {
    fn get_player(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { store.get_player(id).await.map_err(Into::into) })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_player(player).await.map_err(Into::into) })
    }

    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_player(player).await.map_err(Into::into) })
    }

    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_players(limit).await.map_err(Into::into) })
    }
}

impl QuestionBank for MongoTriviaStore {
    fn sample(&self, count: usize) -> BoxFuture<'static, StorageResult<Vec<BankRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.sample(count).await.map_err(Into::into) })
    }
}

impl TriviaStore for MongoTriviaStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
