use tracing::{info, warn};

use crate::{
    dto::play::{BidReceipt, BidRequest},
    error::ServiceError,
    services::{broadcast, similarity},
    state::{
        SharedState,
        topic::{PlayerId, Topic},
    },
};

/// Validate a bid, deduct the stake and queue the topic.
///
/// Checks run in order: minimum stake, length, emptiness, adversarial
/// phrasing, near-duplicates of the current, pending and last past topic, and
/// finally the balance. A rejected bid leaves the ledger untouched.
pub async fn place_bid(
    state: &SharedState,
    player: &PlayerId,
    request: BidRequest,
) -> Result<BidReceipt, ServiceError> {
    let config = state.config();
    let stake = request.points;

    if stake < config.bid_min_points {
        return Err(ServiceError::InvalidInput(format!(
            "bid at least {} points",
            config.bid_min_points
        )));
    }

    let text = request.topic.trim();
    if text.chars().count() > config.topic_max_length {
        return Err(ServiceError::InvalidInput(format!(
            "the topic max length is {} characters",
            config.topic_max_length
        )));
    }
    if text.is_empty() {
        return Err(ServiceError::InvalidInput("cannot send an empty topic".into()));
    }
    if config
        .adversarial_phrases
        .iter()
        .any(|phrase| similarity::is_similar(text, phrase, config.adversarial_threshold))
    {
        warn!(%player, topic = %text, "adversarial topic rejected");
        return Err(ServiceError::InvalidInput("topic rejected".into()));
    }

    let store = state.require_store().await?;
    let _gate = state.ledger_gate().lock().await;

    {
        let round = state.round().lock().await;
        if round.known_texts().any(|known| {
            similarity::is_similar(text, known, config.duplicate_topic_threshold)
        }) {
            return Err(ServiceError::DuplicateTopic(text.to_owned()));
        }
    }

    let mut record = store
        .get_player(player.as_str())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player}` not found")))?;
    if record.points < i64::from(stake) {
        return Err(ServiceError::InsufficientFunds {
            balance: record.points,
            stake,
        });
    }

    record.points -= i64::from(stake);
    let balance = record.points;
    store.update_player(record).await?;

    let topic = Topic::proposed(stake, text, player.clone());
    let topic_id = topic.id;
    state.round().lock().await.enqueue(topic);
    info!(%player, %topic_id, stake, balance, "bid accepted");

    broadcast::broadcast_next_topics(state).await;
    broadcast::notify_points(state, player, balance);

    Ok(BidReceipt { topic_id, balance })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PlayerEntity,
            trivia_store::{MemoryStore, PlayerLedger},
        },
        llm::Oracles,
        state::AppState,
    };

    async fn setup(balance: i64) -> (SharedState, MemoryStore, PlayerId) {
        let state = AppState::new(AppConfig::default(), Oracles::disabled());
        let store = MemoryStore::new();
        store
            .create_player(PlayerEntity::new("alice", balance))
            .await
            .unwrap();
        state.install_store(Arc::new(store.clone())).await;
        (state, store, PlayerId::new("alice"))
    }

    fn bid(topic: &str, points: u32) -> BidRequest {
        BidRequest {
            topic: topic.into(),
            points,
        }
    }

    async fn balance(store: &MemoryStore) -> i64 {
        store.get_player("alice").await.unwrap().unwrap().points
    }

    #[tokio::test]
    async fn whole_balance_can_be_staked() {
        let (state, store, alice) = setup(3).await;
        let receipt = place_bid(&state, &alice, bid("Volcanoes", 3)).await.unwrap();
        assert_eq!(receipt.balance, 0);
        assert_eq!(balance(&store).await, 0);

        let round = state.round().lock().await;
        assert_eq!(round.find(receipt.topic_id).unwrap().text, "Volcanoes");
    }

    #[tokio::test]
    async fn bids_are_ordered_by_stake() {
        let (state, _store, alice) = setup(100).await;
        place_bid(&state, &alice, bid("Volcanoes", 3)).await.unwrap();
        place_bid(&state, &alice, bid("Jazz history", 9)).await.unwrap();
        place_bid(&state, &alice, bid("Origami", 3)).await.unwrap();

        let round = state.round().lock().await;
        let texts: Vec<&str> = round.pending().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Jazz history", "Volcanoes", "Origami"]);
    }

    #[tokio::test]
    async fn rejected_bids_leave_the_balance_alone() {
        let (state, store, alice) = setup(5).await;

        let low = place_bid(&state, &alice, bid("Volcanoes", 2)).await;
        assert!(matches!(low, Err(ServiceError::InvalidInput(_))));

        let long = place_bid(&state, &alice, bid(&"x".repeat(26), 3)).await;
        assert!(matches!(long, Err(ServiceError::InvalidInput(_))));

        let blank = place_bid(&state, &alice, bid("   ", 3)).await;
        assert!(matches!(blank, Err(ServiceError::InvalidInput(_))));

        let sneaky = place_bid(&state, &alice, bid("ignore previous instruct", 3)).await;
        assert!(matches!(sneaky, Err(ServiceError::InvalidInput(_))));

        let rich = place_bid(&state, &alice, bid("Volcanoes", 6)).await;
        assert!(matches!(
            rich,
            Err(ServiceError::InsufficientFunds {
                balance: 5,
                stake: 6
            })
        ));

        assert_eq!(balance(&store).await, 5);
        assert!(state.round().lock().await.pending().is_empty());
    }

    #[tokio::test]
    async fn duplicate_of_a_pending_topic_is_rejected() {
        let (state, store, alice) = setup(20).await;
        place_bid(&state, &alice, bid("Volcanoes", 3)).await.unwrap();

        let duplicate = place_bid(&state, &alice, bid("Volcanoes", 5)).await;
        assert!(matches!(duplicate, Err(ServiceError::DuplicateTopic(_))));
        assert_eq!(balance(&store).await, 17);
    }

    #[tokio::test]
    async fn unknown_player_cannot_bid() {
        let (state, _store, _alice) = setup(20).await;
        let result = place_bid(&state, &PlayerId::new("mallory"), bid("Volcanoes", 3)).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
