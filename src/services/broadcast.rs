use tracing::debug;

use crate::{
    config::AppConfig,
    dto::fragment::{
        Countdown, CurrentQuestion, Fragment, NextTopics, PastTopic, PointsUpdate, Toast,
    },
    state::{
        SharedState,
        hub::{ClientConnection, ClientKey, Outbound, Recipients},
        round::RoundState,
        topic::PlayerId,
    },
};

/// Deliver `fragment` to `recipients`; returns how many connections took it.
pub fn announce(state: &SharedState, recipients: &Recipients, fragment: &Fragment) -> usize {
    let Some(message) = fragment.to_message() else {
        return 0;
    };
    state.hub().deliver(recipients, message)
}

/// Head of the pending queue, censored.
pub fn next_topics(config: &AppConfig, round: &RoundState) -> Fragment {
    Fragment::NextTopics(NextTopics::from_pending(
        round.head(config.nr_topics_to_broadcast),
    ))
}

/// The question being played, if any.
pub fn current_question(round: &RoundState) -> Option<Fragment> {
    round
        .current()
        .and_then(CurrentQuestion::from_round)
        .map(Fragment::CurrentQuestion)
}

/// Seconds left in the round being played, if any.
pub fn countdown(round: &RoundState) -> Option<Fragment> {
    round
        .current()
        .map(|current| Fragment::Countdown(Countdown::new(current.round_id, current.countdown)))
}

/// Summary of the last settled round, if any.
pub fn past_topic(round: &RoundState) -> Option<Fragment> {
    round
        .past()
        .and_then(|past| PastTopic::from_topic(&past.topic, past.settled_at))
        .map(Fragment::PastTopic)
}

/// Everything a fresh connection needs to catch up with the others.
pub fn snapshot(config: &AppConfig, round: &RoundState) -> Vec<Fragment> {
    let mut fragments = vec![next_topics(config, round)];
    fragments.extend(current_question(round));
    fragments.extend(countdown(round));
    fragments.extend(past_topic(round));
    fragments
}

/// Push the refreshed pending list to every connection.
pub async fn broadcast_next_topics(state: &SharedState) {
    // Render and deliver under the round lock so lists never overtake each other.
    let round = state.round().lock().await;
    let fragment = next_topics(state.config(), &round);
    let delivered = announce(state, &Recipients::All, &fragment);
    debug!(delivered, pending = round.pending().len(), "broadcast next topics");
}

/// Send the fresh balance of `player` to all of their connections.
pub fn notify_points(state: &SharedState, player: &PlayerId, balance: i64) {
    announce(
        state,
        &Recipients::Player(player.clone()),
        &Fragment::Points(PointsUpdate { balance }),
    );
}

/// Show a one-off notification to every connection of `player`.
pub fn toast(state: &SharedState, player: &PlayerId, message: impl Into<String>) {
    announce(
        state,
        &Recipients::Player(player.clone()),
        &Fragment::Toast(Toast {
            message: message.into(),
        }),
    );
}

/// Register a connection and replay the round snapshot to it.
pub async fn attach_client(state: &SharedState, key: ClientKey, tx: Outbound) -> ClientConnection {
    let round = state.round().lock().await;
    let connection = state.hub().register(key, tx);
    let target = Recipients::Connection(connection.id);
    for fragment in snapshot(state.config(), &round) {
        announce(state, &target, &fragment);
    }
    connection
}

/// Drop a connection from the hub.
pub fn detach_client(state: &SharedState, connection: &ClientConnection) {
    state.hub().unregister(&connection.key, connection.id);
}
