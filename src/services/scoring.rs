use tracing::{debug, warn};

use crate::{
    dao::trivia_store::TriviaStore,
    error::ServiceError,
    services::broadcast,
    state::{
        SharedState,
        hub::StreakOutcome,
        topic::{Answer, OptionLabel, PlayerId, Topic},
    },
};

/// Correct respondents in submission order.
pub fn winners(answers: &[Answer], correct: OptionLabel) -> Vec<PlayerId> {
    answers
        .iter()
        .filter(|answer| answer.choice == correct)
        .map(|answer| answer.player.clone())
        .collect()
}

/// Fill in the winners of `topic`, update streaks and credit the ledger.
///
/// Every ledger credit is written before this returns, so the past-topic
/// summary broadcast afterwards never runs ahead of the balances. Returns the
/// points credited per winner, streak bonus included.
pub async fn settle(state: &SharedState, topic: &mut Topic) -> Vec<(PlayerId, i64)> {
    let Some(correct) = topic.question.as_ref().map(|question| question.correct) else {
        warn!(topic_id = %topic.id, "settled topic carries no question");
        return Vec::new();
    };
    topic.winners = winners(&topic.answers, correct);

    let config = state.config();
    let threshold = config.combo_consecutive_nr_for_win;
    let mut credits = Vec::with_capacity(topic.winners.len());
    for (player, reward) in topic.rewards() {
        let mut credit = reward;
        if state.hub().record_win(&player, threshold) == StreakOutcome::Completed {
            credit += config.combo_win_points;
            broadcast::toast(
                state,
                &player,
                format!(
                    "{threshold} correct answers in a row! +{} points",
                    config.combo_win_points
                ),
            );
        }
        credits.push((player, credit));
    }
    state.hub().reset_streaks_except(&topic.winners);

    apply_credits(state, &credits).await;
    credits
}

async fn apply_credits(state: &SharedState, credits: &[(PlayerId, i64)]) {
    if credits.is_empty() {
        return;
    }

    let store = match state.require_store().await {
        Ok(store) => store,
        Err(err) => {
            warn!(error = %err, winners = credits.len(), "cannot credit winners");
            return;
        }
    };

    let _gate = state.ledger_gate().lock().await;
    for (player, points) in credits {
        match credit(store.as_ref(), player, *points).await {
            Ok(balance) => {
                debug!(%player, points, balance, "credited winner");
                broadcast::notify_points(state, player, balance);
            }
            Err(err) => warn!(%player, error = %err, "failed to credit winner"),
        }
    }
}

async fn credit(store: &dyn TriviaStore, player: &PlayerId, points: i64) -> Result<i64, ServiceError> {
    let mut record = store
        .get_player(player.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player}` not found")))?;
    record.points += points;
    let balance = record.points;
    store.update_player(record).await?;
    Ok(balance)
}
