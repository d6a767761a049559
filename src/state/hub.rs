use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::topic::PlayerId;

/// Writer channel feeding a websocket writer task.
pub type Outbound = mpsc::UnboundedSender<Message>;

/// Process-unique identifier of one websocket connection.
pub type ConnectionId = u64;

/// Identity a connection is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// Connections opened without a session.
    Unassigned,
    /// Connections of an authenticated player.
    Player(PlayerId),
}

impl ClientKey {
    /// Player behind this key, if any.
    pub fn player(&self) -> Option<&PlayerId> {
        match self {
            Self::Unassigned => None,
            Self::Player(player) => Some(player),
        }
    }
}

/// Handle returned by [`ConnectionHub::register`].
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Connection identifier inside the hub.
    pub id: ConnectionId,
    /// Identity the connection is filed under.
    pub key: ClientKey,
    /// Writer channel for this connection.
    pub tx: Outbound,
}

#[derive(Debug, Default)]
struct ClientEntry {
    connections: IndexMap<ConnectionId, Outbound>,
    streak: u32,
}

/// Who a fragment is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every live connection.
    All,
    /// Every connection of one player.
    Player(PlayerId),
    /// A single connection.
    Connection(ConnectionId),
}

/// Result of crediting a correct answer to a player's streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOutcome {
    /// The player has no live connection, so no streak is tracked.
    NotConnected,
    /// The streak grew to the carried length.
    Extended(u32),
    /// The streak reached the threshold and was reset.
    Completed,
}

/// Live connections keyed by identity, each identity with a rolling correct-answer streak.
///
/// An identity entry exists exactly as long as it has at least one connection.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    clients: DashMap<ClientKey, ClientEntry>,
    next_id: AtomicU64,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// File a new connection under `key`, creating the identity with a zero streak if needed.
    pub fn register(&self, key: ClientKey, tx: Outbound) -> ClientConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients
            .entry(key.clone())
            .or_default()
            .connections
            .insert(id, tx.clone());
        ClientConnection { id, key, tx }
    }

    /// Remove a connection, dropping its identity once no connection is left.
    pub fn unregister(&self, key: &ClientKey, id: ConnectionId) -> bool {
        let removed = self
            .clients
            .get_mut(key)
            .map(|mut entry| entry.connections.shift_remove(&id).is_some())
            .unwrap_or(false);
        self.clients
            .remove_if(key, |_, entry| entry.connections.is_empty());
        removed
    }

    /// Send `message` to `recipients`, pruning every connection whose writer is gone.
    ///
    /// Returns how many connections accepted the message.
    pub fn deliver(&self, recipients: &Recipients, message: Message) -> usize {
        let targets = self.targets(recipients);
        let mut delivered = 0;
        for (key, id, tx) in targets {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(connection = id, "writer closed; dropping connection");
                self.unregister(&key, id);
            }
        }
        delivered
    }

    fn targets(&self, recipients: &Recipients) -> Vec<(ClientKey, ConnectionId, Outbound)> {
        match recipients {
            Recipients::All => self
                .clients
                .iter()
                .flat_map(|entry| {
                    let key = entry.key().clone();
                    entry
                        .connections
                        .iter()
                        .map(|(id, tx)| (key.clone(), *id, tx.clone()))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Recipients::Player(player) => {
                let key = ClientKey::Player(player.clone());
                self.clients
                    .get(&key)
                    .map(|entry| {
                        entry
                            .connections
                            .iter()
                            .map(|(id, tx)| (key.clone(), *id, tx.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            }
            Recipients::Connection(wanted) => self
                .clients
                .iter()
                .find_map(|entry| {
                    entry
                        .connections
                        .get(wanted)
                        .map(|tx| vec![(entry.key().clone(), *wanted, tx.clone())])
                })
                .unwrap_or_default(),
        }
    }

    /// Total number of live connections.
    pub fn connection_count(&self) -> usize {
        self.clients.iter().map(|entry| entry.connections.len()).sum()
    }

    /// Number of live connections for `key`.
    pub fn connections_of(&self, key: &ClientKey) -> usize {
        self.clients
            .get(key)
            .map(|entry| entry.connections.len())
            .unwrap_or(0)
    }

    /// Players with at least one live connection.
    pub fn online_players(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .clients
            .iter()
            .filter_map(|entry| entry.key().player().cloned())
            .collect();
        players.sort();
        players
    }

    /// Current streak of `player`, if they are connected.
    pub fn streak_of(&self, player: &PlayerId) -> Option<u32> {
        self.clients
            .get(&ClientKey::Player(player.clone()))
            .map(|entry| entry.streak)
    }

    /// Credit a correct answer to `player`, completing the streak at `threshold`.
    pub fn record_win(&self, player: &PlayerId, threshold: u32) -> StreakOutcome {
        let Some(mut entry) = self.clients.get_mut(&ClientKey::Player(player.clone())) else {
            return StreakOutcome::NotConnected;
        };

        entry.streak += 1;
        if threshold > 0 && entry.streak >= threshold {
            entry.streak = 0;
            StreakOutcome::Completed
        } else {
            StreakOutcome::Extended(entry.streak)
        }
    }

    /// Reset the streak of every connected identity not listed in `winners`.
    pub fn reset_streaks_except(&self, winners: &[PlayerId]) {
        for mut entry in self.clients.iter_mut() {
            let keep = entry
                .key()
                .player()
                .is_some_and(|player| winners.contains(player));
            if !keep {
                entry.streak = 0;
            }
        }
    }
}
