use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use rand::seq::SliceRandom;

use super::{PlayerLedger, QuestionBank, TriviaStore};
use crate::dao::{
    models::{BankRecordEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

/// Ledger and question bank held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    players: DashMap<String, PlayerEntity>,
    bank: Vec<BankRecordEntity>,
}

impl MemoryStore {
    /// Empty ledger and empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty ledger with the given bank records.
    pub fn with_bank(bank: Vec<BankRecordEntity>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                players: DashMap::new(),
                bank,
            }),
        }
    }

    /// Load the bank from a JSON array of records.
    pub fn load_bank(path: &Path) -> StorageResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            StorageError::unavailable(format!("failed to read `{}`", path.display()), err)
        })?;
        let bank: Vec<BankRecordEntity> = serde_json::from_str(&contents).map_err(|err| {
            StorageError::Corrupt {
                key: path.display().to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self::with_bank(bank))
    }

    /// Number of records in the bank.
    pub fn bank_size(&self) -> usize {
        self.inner.bank.len()
    }
}

impl PlayerLedger for MemoryStore {
    fn get_player(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let found = self.inner.players.get(id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let stored = self
            .inner
            .players
            .entry(player.id.clone())
            .or_insert(player)
            .value()
            .clone();
        Box::pin(async move { Ok(stored) })
    }

    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.players.insert(player.id.clone(), player);
        Box::pin(async { Ok(()) })
    }

    fn top_players(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let mut players: Vec<PlayerEntity> = self
            .inner
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        players.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id)));
        players.truncate(limit);
        Box::pin(async move { Ok(players) })
    }
}

impl QuestionBank for MemoryStore {
    fn sample(&self, count: usize) -> BoxFuture<'static, StorageResult<Vec<BankRecordEntity>>> {
        let mut records = self.inner.bank.clone();
        records.shuffle(&mut rand::rng());
        records.truncate(count);
        Box::pin(async move { Ok(records) })
    }
}

impl TriviaStore for MemoryStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
