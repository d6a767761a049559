//! UI fragments pushed to websocket clients. Every frame is a JSON object tagged by `type`.

use std::time::SystemTime;

use axum::extract::ws::Message;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use super::format_system_time;
use crate::state::{
    round::ActiveRound,
    topic::{OptionLabel, PlayerId, Topic, TopicStatus},
};

/// Remaining seconds at or below which the countdown is flagged urgent.
pub const URGENT_THRESHOLD_SEC: u64 = 5;

/// Every update a client can receive.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fragment {
    /// Head of the pending queue.
    NextTopics(NextTopics),
    /// The question being played.
    CurrentQuestion(CurrentQuestion),
    /// Seconds left in the current round.
    Countdown(Countdown),
    /// Result of the last settled round.
    PastTopic(PastTopic),
    /// Fresh balance of the receiving player.
    Points(PointsUpdate),
    /// Choice the receiving player locked in.
    AnswerSelected(AnswerSelected),
    /// One-off notification.
    Toast(Toast),
}

impl Fragment {
    /// Serialise into a websocket text frame; serialisation failures are logged and dropped.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(payload) => Some(Message::Text(payload.into())),
            Err(err) => {
                warn!(error = %err, "failed to serialize fragment `{self:?}`");
                None
            }
        }
    }
}

/// A pending topic as shown in the list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopicCard {
    /// Topic identifier.
    pub id: Uuid,
    /// Topic text; withheld while the topic is `pending` or `failed`.
    pub text: Option<String>,
    /// Stake of the bid.
    pub points: u32,
    /// Pipeline status.
    pub status: TopicStatus,
    /// Who proposed it.
    pub proposer: PlayerId,
}

impl From<&Topic> for TopicCard {
    fn from(topic: &Topic) -> Self {
        let censored = matches!(topic.status, TopicStatus::Pending | TopicStatus::Failed);
        Self {
            id: topic.id,
            text: (!censored).then(|| topic.text.clone()),
            points: topic.points,
            status: topic.status,
            proposer: topic.proposer.clone(),
        }
    }
}

/// Head of the pending queue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NextTopics {
    /// Topics in queue order.
    pub topics: Vec<TopicCard>,
}

impl NextTopics {
    /// Render the given slice of the queue.
    pub fn from_pending(pending: &[Topic]) -> Self {
        Self {
            topics: pending.iter().map(TopicCard::from).collect(),
        }
    }
}

/// One answer slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionOption {
    /// Slot label.
    pub label: OptionLabel,
    /// Option text.
    pub text: String,
}

/// The question being played, without its answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentQuestion {
    /// Round identifier, echoed by countdown fragments.
    pub round_id: Uuid,
    /// Topic text.
    pub topic: String,
    /// Who proposed the topic.
    pub proposer: PlayerId,
    /// Stake of the bid.
    pub points: u32,
    /// Question prompt.
    pub question: String,
    /// The four options in label order.
    pub options: Vec<QuestionOption>,
    /// Seconds left when rendered.
    pub countdown: u64,
}

impl CurrentQuestion {
    /// Render the active round; `None` if its topic carries no question.
    pub fn from_round(round: &ActiveRound) -> Option<Self> {
        let question = round.topic.question.as_ref()?;
        Some(Self {
            round_id: round.round_id,
            topic: round.topic.text.clone(),
            proposer: round.topic.proposer.clone(),
            points: round.topic.points,
            question: question.prompt.clone(),
            options: OptionLabel::ALL
                .iter()
                .map(|label| QuestionOption {
                    label: *label,
                    text: question.option(*label).to_owned(),
                })
                .collect(),
            countdown: round.countdown,
        })
    }
}

/// Seconds left in the current round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Countdown {
    /// Round being counted down.
    pub round_id: Uuid,
    /// Remaining seconds.
    pub seconds: u64,
    /// Whether the end is near.
    pub urgent: bool,
}

impl Countdown {
    /// Countdown fragment for `seconds` remaining.
    pub fn new(round_id: Uuid, seconds: u64) -> Self {
        Self {
            round_id,
            seconds,
            urgent: seconds <= URGENT_THRESHOLD_SEC,
        }
    }
}

/// A winner and what they earned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WinnerEntry {
    /// Winning player.
    pub player: PlayerId,
    /// Points granted for the round.
    pub reward: i64,
}

/// Result of the last settled round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PastTopic {
    /// Topic text.
    pub topic: String,
    /// Question prompt.
    pub question: String,
    /// Label of the correct option.
    pub correct: OptionLabel,
    /// Text of the correct option.
    pub correct_answer: String,
    /// Winners in submission order with their reward.
    pub winners: Vec<WinnerEntry>,
    /// Number of players who answered.
    pub respondents: usize,
    /// When the round was settled (RFC 3339).
    pub settled_at: String,
}

impl PastTopic {
    /// Render a settled topic; `None` if it carries no question.
    pub fn from_topic(topic: &Topic, settled_at: SystemTime) -> Option<Self> {
        let question = topic.question.as_ref()?;
        Some(Self {
            topic: topic.text.clone(),
            question: question.prompt.clone(),
            correct: question.correct,
            correct_answer: question.correct_text().to_owned(),
            winners: topic
                .rewards()
                .into_iter()
                .map(|(player, reward)| WinnerEntry { player, reward })
                .collect(),
            respondents: topic.answers.len(),
            settled_at: format_system_time(settled_at),
        })
    }
}

/// Fresh balance of the receiving player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsUpdate {
    /// Current balance.
    pub balance: i64,
}

/// Choice the receiving player locked in.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerSelected {
    /// Round the answer belongs to.
    pub round_id: Uuid,
    /// Selected option.
    pub choice: OptionLabel,
}

/// One-off notification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Toast {
    /// Text to display.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::topic::Question;

    fn question() -> Question {
        Question {
            prompt: "Largest ocean?".into(),
            options: [
                "Atlantic".into(),
                "Indian".into(),
                "Pacific".into(),
                "Arctic".into(),
            ],
            correct: OptionLabel::C,
        }
    }

    #[test]
    fn unvetted_topics_are_censored() {
        let pending = Topic::proposed(5, "secret", PlayerId::new("alice"));
        let mut failed = Topic::proposed(4, "bad", PlayerId::new("bob"));
        failed.status = TopicStatus::Failed;
        let mut computing = Topic::proposed(3, "fine", PlayerId::new("carol"));
        computing.status = TopicStatus::Computing;

        let list = NextTopics::from_pending(&[pending, failed, computing]);
        let texts: Vec<Option<&str>> = list.topics.iter().map(|t| t.text.as_deref()).collect();
        assert_eq!(texts, vec![None, None, Some("fine")]);
    }

    #[test]
    fn fragments_are_tagged_by_type() {
        let fragment = Fragment::Countdown(Countdown::new(Uuid::nil(), 4));
        let Some(Message::Text(text)) = fragment.to_message() else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "countdown");
        assert_eq!(value["seconds"], 4);
        assert_eq!(value["urgent"], true);

        assert!(!Countdown::new(Uuid::nil(), 6).urgent);
    }

    #[test]
    fn past_topic_lists_rewards_and_answer() {
        let mut topic = Topic::from_bank("Oceans", question());
        topic.winners = vec![PlayerId::new("alice"), PlayerId::new("bob")];
        let past = PastTopic::from_topic(&topic, SystemTime::UNIX_EPOCH).unwrap();

        assert_eq!(past.correct_answer, "Pacific");
        assert_eq!(past.winners[0].reward, 20);
        assert_eq!(past.winners[1].reward, 10);
        assert_eq!(past.settled_at, "1970-01-01T00:00:00Z");
    }
}
