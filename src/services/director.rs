//! Round director: activates successful topics, drives the countdown and settles rounds.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use crate::{
    services::{broadcast, scoring},
    state::{
        RoundTimer, SharedState,
        hub::Recipients,
        round::{ActiveRound, RoundTrigger},
        state_machine::RoundId,
    },
};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Promote the first successful pending topic to the current round.
///
/// Activation, the announcement and the timer installation happen under one
/// round lock, so clients never observe a consumed topic without a current
/// question. Returns `None` when a round is already running or nothing is ready.
pub async fn consume_next(state: &SharedState) -> Option<RoundId> {
    let countdown = state.config().question_countdown_sec;
    let mut round = state.round().lock().await;
    let (round_id, text) = {
        let active = round.activate_next(countdown)?;
        (active.round_id, active.topic.text.clone())
    };

    for fragment in [
        broadcast::current_question(&round),
        broadcast::countdown(&round),
        Some(broadcast::next_topics(state.config(), &round)),
    ]
    .into_iter()
    .flatten()
    {
        broadcast::announce(state, &Recipients::All, &fragment);
    }

    let handle = tokio::spawn(run_countdown(state.clone(), round_id, countdown));
    state.replace_timer(RoundTimer { round_id, handle }).await;
    drop(round);

    info!(%round_id, topic = %text, countdown, "round started");
    Some(round_id)
}

/// Settle the current round if `trigger` still applies to it, then start the next one.
///
/// Only the first trigger that observes the round still active past its
/// deadline settles it; later triggers return `false`.
pub async fn complete_round(state: &SharedState, trigger: RoundTrigger) -> bool {
    let taken = state.round().lock().await.begin_settlement(
        trigger,
        Instant::now(),
        state.config().countdown(),
    );
    let Some(ActiveRound {
        round_id,
        mut topic,
        sheet,
        ..
    }) = taken
    else {
        debug!(?trigger, "no round to complete");
        return false;
    };

    state.cancel_timer(round_id).await;
    topic.answers = sheet.lock().await.close();
    let credited = scoring::settle(state, &mut topic).await;

    {
        let mut round = state.round().lock().await;
        if round.finish_settlement(round_id, topic) {
            if let Some(fragment) = broadcast::past_topic(&round) {
                broadcast::announce(state, &Recipients::All, &fragment);
            }
        }
    }
    info!(%round_id, ?trigger, winners = credited.len(), "round settled");

    consume_next(state).await;
    true
}

/// Short-circuit whatever round is active.
pub async fn force_complete(state: &SharedState) -> bool {
    complete_round(state, RoundTrigger::Forced).await
}

fn complete_round_boxed(state: SharedState, trigger: RoundTrigger) -> BoxFuture<'static, bool> {
    Box::pin(async move { complete_round(&state, trigger).await })
}

/// Publish the remaining seconds once per tick, then request completion of `round_id`.
async fn run_countdown(state: SharedState, round_id: RoundId, total: u64) {
    let mut ticker = interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
    for remaining in (0..total).rev() {
        ticker.tick().await;
        let mut round = state.round().lock().await;
        if !round.set_countdown(round_id, remaining) {
            return;
        }
        if let Some(fragment) = broadcast::countdown(&round) {
            broadcast::announce(&state, &Recipients::All, &fragment);
        }
    }

    // Settle from a separate task: settlement cancels this timer.
    tokio::spawn(complete_round_boxed(state, RoundTrigger::Deadline(round_id)));
}
