use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    services::broadcast,
    state::{SharedState, topic::Topic},
};

const MONITOR_TICK: Duration = Duration::from_secs(1);

/// Spawn the monitor loop.
pub fn spawn(state: &SharedState) -> JoinHandle<()> {
    tokio::spawn(run(state.clone()))
}

/// Check the queue once per tick; failures are logged and retried on the next tick.
pub async fn run(state: SharedState) {
    let mut ticker = interval(MONITOR_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match refill_if_needed(&state).await {
            Ok(_) => {}
            Err(ServiceError::Degraded) => debug!("storage degraded; skipping refill"),
            Err(err) => warn!(error = %err, "question bank refill failed"),
        }
    }
}

/// Refill the pending queue when every topic is terminal and the queue is below its low-water mark.
///
/// The bank is sampled without holding the round lock; the condition is
/// checked again before the batch is queued. Returns how many topics were added.
pub async fn refill_if_needed(state: &SharedState) -> Result<usize, ServiceError> {
    let low_water = state.config().max_nr_topics_for_allow_more;
    if !state.round().lock().await.needs_refill(low_water) {
        return Ok(0);
    }

    let store = state.require_store().await?;
    let records = store.sample(low_water).await?;
    let topics: Vec<Topic> = records
        .into_iter()
        .filter_map(|record| {
            let label = record.topic.clone();
            Topic::try_from(record)
                .map_err(|err| warn!(topic = %label, error = %err, "skipping malformed bank record"))
                .ok()
        })
        .collect();

    let added = {
        let mut round = state.round().lock().await;
        if !round.needs_refill(low_water) {
            return Ok(0);
        }
        round.extend(topics)
    };

    if added > 0 {
        info!(added, "refilled pending topics from the question bank");
        broadcast::broadcast_next_topics(state).await;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::BankRecordEntity, trivia_store::MemoryStore},
        llm::Oracles,
        state::{
            AppState,
            topic::{PlayerId, TopicStatus},
        },
    };

    fn record(topic: &str, correct: &str) -> BankRecordEntity {
        BankRecordEntity {
            topic: topic.into(),
            question: format!("Something about {topic}?"),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            correct_option: correct.into(),
        }
    }

    async fn state_with_bank(bank: Vec<BankRecordEntity>) -> SharedState {
        let state = AppState::new(AppConfig::default(), Oracles::disabled());
        state
            .install_store(Arc::new(MemoryStore::with_bank(bank)))
            .await;
        state
    }

    #[tokio::test]
    async fn empty_queue_is_refilled_with_bank_topics() {
        let state = state_with_bank(vec![
            record("Oceans", "A"),
            record("Planets", "option B"),
            record("Broken", "Z"),
        ])
        .await;

        assert_eq!(refill_if_needed(&state).await.unwrap(), 2);
        let round = state.round().lock().await;
        assert!(round.pending().iter().all(|topic| topic.from_bank));
        assert!(
            round
                .pending()
                .iter()
                .all(|topic| topic.status == TopicStatus::Pending)
        );
    }

    #[tokio::test]
    async fn queue_with_work_in_flight_is_left_alone() {
        let state = state_with_bank(vec![record("Oceans", "A")]).await;
        state
            .round()
            .lock()
            .await
            .enqueue(Topic::proposed(3, "Rust", PlayerId::new("alice")));

        assert_eq!(refill_if_needed(&state).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn degraded_storage_skips_the_refill() {
        let state = AppState::new(AppConfig::default(), Oracles::disabled());
        assert!(matches!(
            refill_if_needed(&state).await,
            Err(ServiceError::Degraded)
        ));
    }
}
