pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{
    models::{BankRecordEntity, PlayerEntity},
    storage::StorageResult,
};

pub use memory::MemoryStore;

/// Keyed store of player identity to accumulated points.
pub trait PlayerLedger: Send + Sync {
    /// Fetch a player record.
    fn get_player(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Insert `player` unless a record with the same id exists; returns the stored record.
    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Overwrite a player record.
    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Players ordered by points, highest first.
    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
}

/// Read-only source of pre-vetted topics.
pub trait QuestionBank: Send + Sync {
    /// Up to `count` records picked at random.
    fn sample(&self, count: usize) -> BoxFuture<'static, StorageResult<Vec<BankRecordEntity>>>;
}

/// Full storage backend installed into the shared state.
pub trait TriviaStore: PlayerLedger + QuestionBank {
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
