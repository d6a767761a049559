use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::PlayerEntity,
    dto::fragment::{CurrentQuestion, NextTopics, PastTopic},
    state::{state_machine::RoundPhase, topic::PlayerId},
};

/// A leaderboard row.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Display name.
    pub name: String,
    /// Current balance.
    pub points: i64,
}

impl From<PlayerEntity> for LeaderboardEntry {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            points: value.points,
        }
    }
}

/// Top players by points.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Rows, highest balance first.
    pub players: Vec<LeaderboardEntry>,
}

/// Players currently connected.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnlineResponse {
    /// Connected players, excluding anonymous connections.
    pub players: Vec<PlayerId>,
    /// Live connections, anonymous ones included.
    pub connections: usize,
}

/// Round phase as seen by the public.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublicPhase {
    /// Waiting for a successful topic.
    Idle,
    /// A question is being played.
    Active,
    /// Scores are being applied.
    Settling,
}

impl From<RoundPhase> for PublicPhase {
    fn from(value: RoundPhase) -> Self {
        match value {
            RoundPhase::Idle => Self::Idle,
            RoundPhase::Active { .. } => Self::Active,
            RoundPhase::Settling { .. } => Self::Settling,
        }
    }
}

/// Snapshot of the round: what clients see after connecting.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundResponse {
    /// Round phase.
    pub phase: PublicPhase,
    /// The question being played.
    pub current: Option<CurrentQuestion>,
    /// Head of the pending queue.
    pub next_topics: NextTopics,
    /// Result of the last settled round.
    pub past: Option<PastTopic>,
    /// Whether storage is unavailable.
    pub degraded: bool,
}
