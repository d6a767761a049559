//! Topics, questions and answer sheets flowing through the round pipeline.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::BankRecordEntity;

/// Display name used for topics refilled from the question bank.
pub const BOT_PROPOSER: &str = "[bot]";

/// Points separating consecutive winners; the last correct respondent earns one step.
pub const REWARD_STEP: i64 = 10;

/// Stable identifier attached to every topic when it is created.
pub type TopicId = Uuid;

/// Session identity of a player, as provided by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap a raw session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline status of a topic.
///
/// Statuses only ever move forward: `pending -> computing -> {successful | failed}`,
/// with bank topics jumping from `pending` straight to `successful`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    /// Waiting for the validator.
    Pending,
    /// Accepted by the validator, waiting for question generation.
    Computing,
    /// Carries a question and can become the current topic.
    Successful,
    /// Rejected or errored; removed after the retention grace period.
    Failed,
}

impl TopicStatus {
    /// Whether no pipeline stage applies to this status anymore.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Computing => 1,
            Self::Successful | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only ordering.
    pub fn can_advance_to(self, next: TopicStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// One of the four answer slots of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum OptionLabel {
    /// First option.
    A,
    /// Second option.
    B,
    /// Third option.
    C,
    /// Fourth option.
    D,
}

impl OptionLabel {
    /// Every label in display order.
    pub const ALL: [OptionLabel; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Position of the label inside [`Question::options`].
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

/// Error returned when a string does not name an option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown option label `{0}`")]
pub struct UnknownOptionLabel(pub String);

impl FromStr for OptionLabel {
    type Err = UnknownOptionLabel;

    /// Accepts `A`, `a`, `option A`, `option_A` and similar spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let letter = lowered
            .strip_prefix("option")
            .map(|rest| rest.trim_start_matches([' ', '_']))
            .unwrap_or(lowered.as_str());

        match letter {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            _ => Err(UnknownOptionLabel(trimmed.to_owned())),
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(letter)
    }
}

/// A four-option trivia question. Immutable once attached to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question text shown to players.
    pub prompt: String,
    /// Option texts, indexed by [`OptionLabel::index`].
    pub options: [String; 4],
    /// Label of the correct option.
    pub correct: OptionLabel,
}

impl Question {
    /// Text of the given option.
    pub fn option(&self, label: OptionLabel) -> &str {
        &self.options[label.index()]
    }

    /// Text of the correct option.
    pub fn correct_text(&self) -> &str {
        self.option(self.correct)
    }
}

/// A player's choice for the active topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Who answered.
    pub player: PlayerId,
    /// Which option they picked.
    pub choice: OptionLabel,
}

/// A bid or bank entry moving through the pipeline towards becoming the current question.
#[derive(Debug, Clone)]
pub struct Topic {
    /// Identifier used for claims and membership checks.
    pub id: TopicId,
    /// Stake of the bid; orders the pending queue (higher first).
    pub points: u32,
    /// Topic text as proposed.
    pub text: String,
    /// Current pipeline status.
    pub status: TopicStatus,
    /// Who proposed it ([`BOT_PROPOSER`] for bank topics).
    pub proposer: PlayerId,
    /// Question attached once generation succeeded.
    pub question: Option<Question>,
    /// Answers in submission order, filled in at settlement.
    pub answers: Vec<Answer>,
    /// Correct respondents in submission order, filled in at settlement.
    pub winners: Vec<PlayerId>,
    /// Pre-vetted topic that skips validation and generation.
    pub from_bank: bool,
}

impl Topic {
    /// Create a pending topic from a player's bid.
    pub fn proposed(points: u32, text: impl Into<String>, proposer: PlayerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            text: text.into(),
            status: TopicStatus::Pending,
            proposer,
            question: None,
            answers: Vec::new(),
            winners: Vec::new(),
            from_bank: false,
        }
    }

    /// Create a zero-point bank topic that already carries its question.
    pub fn from_bank(text: impl Into<String>, question: Question) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: 0,
            text: text.into(),
            status: TopicStatus::Pending,
            proposer: PlayerId::new(BOT_PROPOSER),
            question: Some(question),
            answers: Vec::new(),
            winners: Vec::new(),
            from_bank: true,
        }
    }

    /// Reward of each winner, in submission order: earlier correct answers earn more.
    pub fn rewards(&self) -> Vec<(PlayerId, i64)> {
        let total = self.winners.len();
        self.winners
            .iter()
            .enumerate()
            .map(|(position, player)| (player.clone(), (total - position) as i64 * REWARD_STEP))
            .collect()
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Topic {}

impl TryFrom<BankRecordEntity> for Topic {
    type Error = UnknownOptionLabel;

    fn try_from(record: BankRecordEntity) -> Result<Self, Self::Error> {
        let correct = record.correct_option.parse::<OptionLabel>()?;
        let question = Question {
            prompt: record.question,
            options: [
                record.option_a,
                record.option_b,
                record.option_c,
                record.option_d,
            ],
            correct,
        };
        Ok(Topic::from_bank(record.topic, question))
    }
}

/// Answers collected for the active topic. Last choice per player wins.
#[derive(Debug, Default)]
pub struct AnswerSheet {
    answers: Vec<Answer>,
    closed: bool,
}

impl AnswerSheet {
    /// Record `choice` for `player`, replacing any earlier choice.
    ///
    /// Returns `false` once the sheet has been closed for scoring.
    pub fn record(&mut self, player: PlayerId, choice: OptionLabel) -> bool {
        if self.closed {
            return false;
        }
        self.answers.retain(|answer| answer.player != player);
        self.answers.push(Answer { player, choice });
        true
    }

    /// Close the sheet and hand its answers over in submission order.
    pub fn close(&mut self) -> Vec<Answer> {
        self.closed = true;
        std::mem::take(&mut self.answers)
    }

    /// Answers recorded so far.
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Whether scoring already took the answers.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
