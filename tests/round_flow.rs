//! End-to-end round flow through the public library API.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use trivia_back::{
    config::AppConfig,
    dao::{
        models::BankRecordEntity,
        trivia_store::{MemoryStore, PlayerLedger},
    },
    dto::play::BidRequest,
    error::ServiceError,
    llm::{OracleError, Oracles, QuestionGenerator, TopicValidator, Verdict},
    services::{answers, bid_service, broadcast, director, monitor, pipeline, player_service},
    state::{
        AppState, SharedState,
        hub::ClientKey,
        state_machine::RoundPhase,
        topic::{OptionLabel, PlayerId, Question, TopicStatus},
    },
};

struct Scripted {
    verdict: Verdict,
}

impl TopicValidator for Scripted {
    fn validate(&self, _topic: &str) -> BoxFuture<'static, Result<Verdict, OracleError>> {
        let verdict = self.verdict;
        Box::pin(async move { Ok(verdict) })
    }
}

impl QuestionGenerator for Scripted {
    fn generate(&self, topic: &str) -> BoxFuture<'static, Result<Question, OracleError>> {
        let prompt = format!("Which of these relates to {topic}?");
        Box::pin(async move {
            Ok(Question {
                prompt,
                options: ["one".into(), "two".into(), "three".into(), "four".into()],
                correct: OptionLabel::D,
            })
        })
    }
}

fn oracles(verdict: Verdict) -> Oracles {
    let oracle = Arc::new(Scripted { verdict });
    Oracles {
        validator: oracle.clone(),
        generator: oracle,
    }
}

fn config(countdown: u64) -> AppConfig {
    AppConfig {
        question_countdown_sec: countdown,
        ..AppConfig::default()
    }
}

fn ocean_record() -> BankRecordEntity {
    BankRecordEntity {
        topic: "Oceans".into(),
        question: "Which is the largest ocean?".into(),
        option_a: "Atlantic".into(),
        option_b: "Indian".into(),
        option_c: "Pacific".into(),
        option_d: "Arctic".into(),
        correct_option: "C".into(),
    }
}

async fn start(config: AppConfig, verdict: Verdict, store: MemoryStore) -> SharedState {
    let state = AppState::new(config, oracles(verdict));
    state.install_store(Arc::new(store)).await;
    state
}

async fn balance(store: &MemoryStore, id: &str) -> i64 {
    store.get_player(id).await.unwrap().unwrap().points
}

#[tokio::test(start_paused = true)]
async fn earlier_correct_answer_earns_more_at_expiry() {
    let store = MemoryStore::with_bank(vec![ocean_record()]);
    let state = start(config(5), Verdict::Accept, store.clone()).await;
    let alice = PlayerId::new("alice");
    let bob = PlayerId::new("bob");
    let carol = PlayerId::new("carol");
    for player in [&alice, &bob, &carol] {
        player_service::ensure_player(&state, player).await.unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    broadcast::attach_client(&state, ClientKey::Player(alice.clone()), tx).await;

    assert_eq!(monitor::refill_if_needed(&state).await.unwrap(), 1);
    assert!(pipeline::step(&state, 0).await);
    assert!(matches!(
        state.round().lock().await.phase(),
        RoundPhase::Active { .. }
    ));

    answers::record_answer(&state, &alice, OptionLabel::C).await.unwrap();
    answers::record_answer(&state, &carol, OptionLabel::A).await.unwrap();
    answers::record_answer(&state, &bob, OptionLabel::C).await.unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;

    let initial = AppConfig::default().initial_player_points;
    assert_eq!(balance(&store, "alice").await, initial + 20);
    assert_eq!(balance(&store, "bob").await, initial + 10);
    assert_eq!(balance(&store, "carol").await, initial);

    {
        let round = state.round().lock().await;
        assert_eq!(round.phase(), RoundPhase::Idle);
        let past = round.past().unwrap();
        assert_eq!(past.topic.winners, vec![alice.clone(), bob.clone()]);
        assert_eq!(past.topic.answers.len(), 3);
    }

    let mut kinds = Vec::new();
    while let Ok(axum::extract::ws::Message::Text(text)) = rx.try_recv() {
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        kinds.push(value["type"].as_str().unwrap().to_owned());
    }
    for expected in ["current_question", "countdown", "answer_selected", "points", "past_topic"] {
        assert!(kinds.iter().any(|kind| kind == expected), "no {expected} in {kinds:?}");
    }
    let points = kinds.iter().position(|kind| kind == "points").unwrap();
    let past = kinds.iter().position(|kind| kind == "past_topic").unwrap();
    assert!(points < past);
}

#[tokio::test]
async fn player_topic_goes_from_bid_to_current_question() {
    let store = MemoryStore::new();
    let state = start(config(22), Verdict::Accept, store.clone()).await;
    let alice = PlayerId::new("alice");
    player_service::ensure_player(&state, &alice).await.unwrap();

    let receipt = bid_service::place_bid(
        &state,
        &alice,
        BidRequest {
            topic: "Volcanoes".into(),
            points: 3,
        },
    )
    .await
    .unwrap();
    assert_eq!(receipt.balance, AppConfig::default().initial_player_points - 3);

    assert!(pipeline::step(&state, 0).await);
    assert!(pipeline::step(&state, 1).await);

    let round = state.round().lock().await;
    let current = round.current().unwrap();
    assert_eq!(current.topic.id, receipt.topic_id);
    assert_eq!(current.topic.proposer, alice);
    assert!(current.topic.question.is_some());
}

#[tokio::test]
async fn exact_balance_bid_and_duplicate_rejection() {
    let store = MemoryStore::new();
    let state = start(config(22), Verdict::Accept, store.clone()).await;
    let alice = PlayerId::new("alice");
    let bob = PlayerId::new("bob");
    player_service::ensure_player(&state, &alice).await.unwrap();
    player_service::ensure_player(&state, &bob).await.unwrap();

    let mut record = store.get_player("alice").await.unwrap().unwrap();
    record.points = 3;
    store.update_player(record).await.unwrap();

    let receipt = bid_service::place_bid(
        &state,
        &alice,
        BidRequest {
            topic: "Volcanoes".into(),
            points: 3,
        },
    )
    .await
    .unwrap();
    assert_eq!(receipt.balance, 0);
    assert_eq!(balance(&store, "alice").await, 0);

    let duplicate = bid_service::place_bid(
        &state,
        &bob,
        BidRequest {
            topic: "Volcanoes".into(),
            points: 10,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(ServiceError::DuplicateTopic(_))));
    assert_eq!(
        balance(&store, "bob").await,
        AppConfig::default().initial_player_points
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_topic_is_shown_failed_then_removed() {
    let store = MemoryStore::new();
    let state = start(config(22), Verdict::Reject, store.clone()).await;
    let alice = PlayerId::new("alice");
    player_service::ensure_player(&state, &alice).await.unwrap();

    let receipt = bid_service::place_bid(
        &state,
        &alice,
        BidRequest {
            topic: "Anything goes".into(),
            points: 3,
        },
    )
    .await
    .unwrap();

    assert!(pipeline::step(&state, 0).await);
    assert_eq!(
        state
            .round()
            .lock()
            .await
            .find(receipt.topic_id)
            .map(|topic| topic.status),
        Some(TopicStatus::Failed)
    );

    tokio::time::sleep(state.config().failed_retention() + Duration::from_millis(100)).await;
    assert!(state.round().lock().await.find(receipt.topic_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn forced_completion_moves_to_the_next_topic() {
    let mut second = ocean_record();
    second.topic = "Mountains".into();
    let store = MemoryStore::with_bank(vec![ocean_record(), second]);
    let state = start(config(30), Verdict::Accept, store).await;

    monitor::refill_if_needed(&state).await.unwrap();
    assert!(pipeline::step(&state, 0).await);
    assert!(pipeline::step(&state, 1).await);

    let first = state.round().lock().await.current().unwrap().round_id;
    assert!(director::force_complete(&state).await);

    let round = state.round().lock().await;
    assert!(round.past().is_some());
    assert_ne!(round.current().unwrap().round_id, first);
}
