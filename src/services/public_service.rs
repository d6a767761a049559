//! Service helpers that expose read-only public projections of the round.

use crate::{
    dto::{
        fragment::{CurrentQuestion, NextTopics, PastTopic},
        public::{LeaderboardEntry, LeaderboardResponse, OnlineResponse, RoundResponse},
    },
    error::ServiceError,
    state::SharedState,
};

/// Rows shown on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 20;

/// Return the top players by points.
pub async fn get_leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_store().await?;
    let players = store
        .top_players(LEADERBOARD_SIZE)
        .await?
        .into_iter()
        .map(LeaderboardEntry::from)
        .collect();
    Ok(LeaderboardResponse { players })
}

/// Return the players currently connected.
pub fn get_online(state: &SharedState) -> OnlineResponse {
    OnlineResponse {
        players: state.hub().online_players(),
        connections: state.hub().connection_count(),
    }
}

/// Return the round as a freshly connected client would see it.
pub async fn get_round(state: &SharedState) -> RoundResponse {
    let round = state.round().lock().await;
    RoundResponse {
        phase: round.phase().into(),
        current: round.current().and_then(CurrentQuestion::from_round),
        next_topics: NextTopics::from_pending(round.head(state.config().nr_topics_to_broadcast)),
        past: round
            .past()
            .and_then(|past| PastTopic::from_topic(&past.topic, past.settled_at)),
        degraded: state.is_degraded(),
    }
}
