pub mod hub;
pub mod round;
pub mod state_machine;
pub mod topic;

use std::sync::Arc;

use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};

use crate::{
    config::AppConfig,
    dao::trivia_store::TriviaStore,
    error::ServiceError,
    llm::Oracles,
};

use self::{hub::ConnectionHub, round::RoundState, state_machine::RoundId};

pub type SharedState = Arc<AppState>;

/// Countdown task driving one round instance.
pub struct RoundTimer {
    /// Round the task belongs to.
    pub round_id: RoundId,
    /// Handle used to abort the task.
    pub handle: JoinHandle<()>,
}

/// Central application state: the round model, live connections and backends.
pub struct AppState {
    config: Arc<AppConfig>,
    round: Mutex<RoundState>,
    hub: ConnectionHub,
    store: RwLock<Option<Arc<dyn TriviaStore>>>,
    oracles: Oracles,
    timer: Mutex<Option<RoundTimer>>,
    ledger_gate: Mutex<()>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, oracles: Oracles) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let lanes = config.pipeline_workers;
        Arc::new(Self {
            config: Arc::new(config),
            round: Mutex::new(RoundState::new(lanes)),
            hub: ConnectionHub::new(),
            store: RwLock::new(None),
            oracles,
            timer: Mutex::new(None),
            ledger_gate: Mutex::new(()),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Pending topics and round bookkeeping, behind the round lock.
    pub fn round(&self) -> &Mutex<RoundState> {
        &self.round
    }

    /// Registry of live websocket connections.
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Topic validator and question generator.
    pub fn oracles(&self) -> &Oracles {
        &self.oracles
    }

    /// Serialises read-modify-write cycles on player balances.
    pub fn ledger_gate(&self) -> &Mutex<()> {
        &self.ledger_gate
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TriviaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_store(&self) -> Result<Arc<dyn TriviaStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TriviaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Install the countdown task of a new round, aborting whatever task it supersedes.
    pub async fn replace_timer(&self, timer: RoundTimer) {
        let previous = self.timer.lock().await.replace(timer);
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Abort the countdown task of `round_id`; a newer round's task is left alone.
    pub async fn cancel_timer(&self, round_id: RoundId) -> bool {
        let mut guard = self.timer.lock().await;
        match guard.as_ref() {
            Some(timer) if timer.round_id == round_id => {
                if let Some(timer) = guard.take() {
                    timer.handle.abort();
                }
                true
            }
            _ => false,
        }
    }
}
