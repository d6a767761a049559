//! Shared round model: the pending topic queue, per-lane claims, the current
//! round and the last settled topic. Every mutation happens under the single
//! round lock held by [`AppState`](crate::state::AppState).

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, SystemTime},
};

use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use super::{
    state_machine::{RoundEvent, RoundId, RoundPhase, RoundStateMachine},
    topic::{AnswerSheet, Question, Topic, TopicId, TopicStatus},
};

/// Slack granted to the deadline check so a timer firing slightly early still completes its round.
pub const DEADLINE_TOLERANCE: Duration = Duration::from_secs(1);

/// The topic currently being played.
#[derive(Debug)]
pub struct ActiveRound {
    /// Identifier of this activation.
    pub round_id: RoundId,
    /// Topic being played; always carries a question.
    pub topic: Topic,
    /// When the topic became current.
    pub started_at: Instant,
    /// Seconds left on the countdown, as last published.
    pub countdown: u64,
    /// Answers collected for this round, guarded by their own lock.
    pub sheet: Arc<Mutex<AnswerSheet>>,
}

/// The last settled topic, kept for the results panel.
#[derive(Debug, Clone)]
pub struct SettledTopic {
    /// Topic with its answers and winners filled in.
    pub topic: Topic,
    /// Wall-clock time of settlement.
    pub settled_at: SystemTime,
}

/// Detached copy of a claimed topic handed to a pipeline lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Lane holding the claim.
    pub lane: usize,
    /// Claimed topic.
    pub topic_id: TopicId,
    /// Topic text for the external calls.
    pub text: String,
    /// Status observed when the claim was taken.
    pub status: TopicStatus,
    /// Whether the topic came from the question bank.
    pub from_bank: bool,
}

/// Result of one pipeline stage, applied back under the round lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Bank topic settled, no external call needed.
    Settled,
    /// Validator accepted the topic.
    Accepted,
    /// Generator produced a question.
    Generated(Question),
    /// Validator rejected the topic or an external call failed.
    Failed,
}

/// Why a stage outcome could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvanceError {
    /// The topic left the pending queue while the lane was working on it.
    #[error("topic `{0}` is no longer pending")]
    Missing(TopicId),
    /// Applying the outcome would move the status backwards.
    #[error("topic `{id}` cannot move from {from:?} to {to:?}")]
    Regression {
        /// Topic concerned.
        id: TopicId,
        /// Status currently committed.
        from: TopicStatus,
        /// Status the outcome asked for.
        to: TopicStatus,
    },
}

/// What asked for the current round to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTrigger {
    /// The countdown of the given round elapsed.
    Deadline(RoundId),
    /// An operator short-circuited whatever round is active.
    Forced,
}

/// Pending topics plus round bookkeeping.
#[derive(Debug)]
pub struct RoundState {
    pending: Vec<Topic>,
    claims: Vec<HashSet<TopicId>>,
    current: Option<ActiveRound>,
    past: Option<SettledTopic>,
    machine: RoundStateMachine,
}

impl RoundState {
    /// Create an empty round model with `lanes` pipeline claim sets.
    pub fn new(lanes: usize) -> Self {
        Self {
            pending: Vec::new(),
            claims: vec![HashSet::new(); lanes],
            current: None,
            past: None,
            machine: RoundStateMachine::new(),
        }
    }

    /// Pending topics in queue order (points descending, then arrival).
    pub fn pending(&self) -> &[Topic] {
        &self.pending
    }

    /// The first `count` pending topics.
    pub fn head(&self, count: usize) -> &[Topic] {
        &self.pending[..count.min(self.pending.len())]
    }

    /// Look up a pending topic.
    pub fn find(&self, id: TopicId) -> Option<&Topic> {
        self.pending.iter().find(|topic| topic.id == id)
    }

    /// The round being played, if any.
    pub fn current(&self) -> Option<&ActiveRound> {
        self.current.as_ref()
    }

    /// The last settled topic, with its winners.
    pub fn past(&self) -> Option<&SettledTopic> {
        self.past.as_ref()
    }

    /// Phase of the round cycle.
    pub fn phase(&self) -> RoundPhase {
        self.machine.phase()
    }

    /// Insert a topic behind every pending topic with at least as many points.
    pub fn enqueue(&mut self, topic: Topic) {
        let index = self
            .pending
            .partition_point(|existing| existing.points >= topic.points);
        self.pending.insert(index, topic);
    }

    /// Enqueue a batch, returning how many topics were added.
    pub fn extend(&mut self, topics: impl IntoIterator<Item = Topic>) -> usize {
        let mut added = 0;
        for topic in topics {
            self.enqueue(topic);
            added += 1;
        }
        added
    }

    /// Whether every pending topic reached a terminal status (vacuously true when empty).
    pub fn all_terminal(&self) -> bool {
        self.pending.iter().all(|topic| topic.status.is_terminal())
    }

    /// Whether the monitor should pull a new batch from the question bank.
    pub fn needs_refill(&self, low_water: usize) -> bool {
        self.all_terminal() && self.pending.len() < low_water
    }

    /// Texts a new bid must not duplicate: current, pending and last past topic.
    pub fn known_texts(&self) -> impl Iterator<Item = &str> {
        self.current
            .iter()
            .map(|round| round.topic.text.as_str())
            .chain(self.pending.iter().map(|topic| topic.text.as_str()))
            .chain(self.past.iter().map(|past| past.topic.text.as_str()))
    }

    /// Whether any lane currently holds `id`.
    pub fn is_claimed(&self, id: TopicId) -> bool {
        self.claims.iter().any(|claims| claims.contains(&id))
    }

    /// Claim the first eligible topic for `lane`.
    ///
    /// A lane holds at most one claim, and a topic is only handed out when no
    /// other lane holds it and it is not terminal.
    pub fn claim_next(&mut self, lane: usize) -> Option<Claim> {
        if !self.claims.get(lane)?.is_empty() {
            return None;
        }

        let topic = self
            .pending
            .iter()
            .find(|topic| !topic.status.is_terminal() && !self.is_claimed(topic.id))?;

        let claim = Claim {
            lane,
            topic_id: topic.id,
            text: topic.text.clone(),
            status: topic.status,
            from_bank: topic.from_bank,
        };
        self.claims[lane].insert(claim.topic_id);
        Some(claim)
    }

    /// Drop the claim `lane` holds on `id`.
    pub fn release(&mut self, lane: usize, id: TopicId) {
        if let Some(claims) = self.claims.get_mut(lane) {
            claims.remove(&id);
        }
    }

    /// Apply a stage outcome, enforcing forward-only status transitions.
    pub fn apply_outcome(
        &mut self,
        id: TopicId,
        outcome: StageOutcome,
    ) -> Result<TopicStatus, AdvanceError> {
        let topic = self
            .pending
            .iter_mut()
            .find(|topic| topic.id == id)
            .ok_or(AdvanceError::Missing(id))?;

        let (next, question) = match outcome {
            StageOutcome::Settled => (TopicStatus::Successful, None),
            StageOutcome::Accepted => (TopicStatus::Computing, None),
            StageOutcome::Generated(question) => (TopicStatus::Successful, Some(question)),
            StageOutcome::Failed => (TopicStatus::Failed, None),
        };

        if !topic.status.can_advance_to(next) {
            return Err(AdvanceError::Regression {
                id,
                from: topic.status,
                to: next,
            });
        }

        if next == TopicStatus::Successful && topic.question.is_none() && question.is_none() {
            // A successful topic must be playable.
            topic.status = TopicStatus::Failed;
            return Ok(TopicStatus::Failed);
        }

        if let Some(question) = question {
            topic.question = Some(question);
        }
        topic.status = next;
        Ok(next)
    }

    /// Remove `id` if it is still pending with a `failed` status.
    pub fn remove_if_failed(&mut self, id: TopicId) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|topic| !(topic.id == id && topic.status == TopicStatus::Failed));
        self.pending.len() != before
    }

    /// Promote the first successful pending topic to the current round.
    ///
    /// Only possible while no round is active or settling.
    pub fn activate_next(&mut self, countdown: u64) -> Option<&ActiveRound> {
        if self.machine.phase() != RoundPhase::Idle {
            return None;
        }

        let index = self
            .pending
            .iter()
            .position(|topic| topic.status == TopicStatus::Successful)?;
        let round_id = Uuid::new_v4();
        self.machine.apply(RoundEvent::Activate(round_id)).ok()?;

        let topic = self.pending.remove(index);
        self.current = Some(ActiveRound {
            round_id,
            topic,
            started_at: Instant::now(),
            countdown,
            sheet: Arc::new(Mutex::new(AnswerSheet::default())),
        });
        self.current.as_ref()
    }

    /// Update the published countdown of `round_id`. Returns `false` once that round is gone.
    pub fn set_countdown(&mut self, round_id: RoundId, remaining: u64) -> bool {
        match self.current.as_mut() {
            Some(round) if round.round_id == round_id => {
                round.countdown = remaining;
                true
            }
            _ => false,
        }
    }

    /// Take the current round out for settlement if `trigger` still applies to it.
    ///
    /// Only the first caller observing the round active past its deadline (or
    /// forcing it) gets the round; every later caller gets `None`.
    pub fn begin_settlement(
        &mut self,
        trigger: RoundTrigger,
        now: Instant,
        countdown: Duration,
    ) -> Option<ActiveRound> {
        let current = self.current.as_ref()?;
        let round_id = current.round_id;

        if let RoundTrigger::Deadline(expected) = trigger {
            let elapsed = now.saturating_duration_since(current.started_at);
            if expected != round_id || elapsed + DEADLINE_TOLERANCE < countdown {
                return None;
            }
        }

        self.machine.apply(RoundEvent::Expire(round_id)).ok()?;
        self.current.take()
    }

    /// Store the settled topic as the past topic and return to idle.
    pub fn finish_settlement(&mut self, round_id: RoundId, topic: Topic) -> bool {
        if self.machine.apply(RoundEvent::Settled(round_id)).is_err() {
            return false;
        }
        self.past = Some(SettledTopic {
            topic,
            settled_at: SystemTime::now(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::topic::{OptionLabel, PlayerId};

    fn question() -> Question {
        Question {
            prompt: "2 + 2?".into(),
            options: ["3".into(), "4".into(), "5".into(), "22".into()],
            correct: OptionLabel::B,
        }
    }

    fn bid(points: u32, text: &str) -> Topic {
        Topic::proposed(points, text, PlayerId::new("alice"))
    }

    fn successful(text: &str) -> Topic {
        let mut topic = Topic::from_bank(text, question());
        topic.status = TopicStatus::Successful;
        topic
    }

    fn texts(state: &RoundState) -> Vec<&str> {
        state.pending().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn queue_orders_by_points_then_arrival() {
        let mut state = RoundState::new(2);
        state.enqueue(bid(3, "first three"));
        state.enqueue(bid(10, "ten"));
        state.enqueue(bid(3, "second three"));
        state.enqueue(bid(0, "zero"));
        state.enqueue(bid(5, "five"));

        assert_eq!(
            texts(&state),
            vec!["ten", "five", "first three", "second three", "zero"]
        );
        assert_eq!(state.head(2).len(), 2);
        assert_eq!(state.head(20).len(), 5);
    }

    #[test]
    fn lanes_never_share_a_topic() {
        let mut state = RoundState::new(3);
        state.enqueue(bid(5, "a"));
        state.enqueue(bid(4, "b"));

        let first = state.claim_next(0).unwrap();
        let second = state.claim_next(1).unwrap();
        assert_ne!(first.topic_id, second.topic_id);
        assert!(state.claim_next(2).is_none());

        // A lane holding a claim cannot take another one.
        assert!(state.claim_next(0).is_none());

        state.release(0, first.topic_id);
        let again = state.claim_next(2).unwrap();
        assert_eq!(again.topic_id, first.topic_id);
        assert!(state.is_claimed(first.topic_id));
    }

    #[test]
    fn unknown_lane_claims_nothing() {
        let mut state = RoundState::new(1);
        state.enqueue(bid(5, "a"));
        assert!(state.claim_next(7).is_none());
    }

    #[test]
    fn terminal_topics_are_not_claimed() {
        let mut state = RoundState::new(1);
        state.enqueue(successful("done"));
        assert!(state.claim_next(0).is_none());
    }

    #[test]
    fn outcomes_move_status_forward_only() {
        let mut state = RoundState::new(1);
        let topic = bid(5, "Rust");
        let id = topic.id;
        state.enqueue(topic);

        assert_eq!(
            state.apply_outcome(id, StageOutcome::Accepted),
            Ok(TopicStatus::Computing)
        );
        assert_eq!(
            state.apply_outcome(id, StageOutcome::Generated(question())),
            Ok(TopicStatus::Successful)
        );
        assert!(matches!(
            state.apply_outcome(id, StageOutcome::Failed),
            Err(AdvanceError::Regression { .. })
        ));
        assert_eq!(state.find(id).unwrap().question, Some(question()));
    }

    #[test]
    fn outcome_for_removed_topic_is_reported() {
        let mut state = RoundState::new(1);
        let id = Uuid::new_v4();
        assert_eq!(
            state.apply_outcome(id, StageOutcome::Accepted),
            Err(AdvanceError::Missing(id))
        );
    }

    #[test]
    fn settled_topic_without_question_fails() {
        let mut state = RoundState::new(1);
        let topic = bid(5, "no question");
        let id = topic.id;
        state.enqueue(topic);
        assert_eq!(
            state.apply_outcome(id, StageOutcome::Settled),
            Ok(TopicStatus::Failed)
        );
    }

    #[test]
    fn only_failed_topics_are_removed() {
        let mut state = RoundState::new(1);
        let failed = bid(5, "bad");
        let failed_id = failed.id;
        let pending = bid(4, "good");
        let pending_id = pending.id;
        state.enqueue(failed);
        state.enqueue(pending);
        state.apply_outcome(failed_id, StageOutcome::Failed).unwrap();

        assert!(!state.remove_if_failed(pending_id));
        assert!(state.remove_if_failed(failed_id));
        assert!(!state.remove_if_failed(failed_id));
        assert_eq!(texts(&state), vec!["good"]);
    }

    #[test]
    fn refill_needed_only_when_all_terminal_and_below_low_water() {
        let mut state = RoundState::new(1);
        assert!(state.needs_refill(20));

        state.enqueue(bid(3, "pending"));
        assert!(!state.needs_refill(20));

        let mut state = RoundState::new(1);
        state.enqueue(successful("one"));
        state.enqueue(successful("two"));
        assert!(state.needs_refill(3));
        assert!(!state.needs_refill(2));
    }

    #[test]
    fn activation_takes_first_successful_and_blocks_until_settled() {
        let mut state = RoundState::new(1);
        state.enqueue(bid(9, "still pending"));
        state.enqueue(successful("bank one"));
        state.enqueue(successful("bank two"));

        let round_id = {
            let round = state.activate_next(22).unwrap();
            assert_eq!(round.topic.text, "bank one");
            assert_eq!(round.countdown, 22);
            round.round_id
        };
        assert_eq!(texts(&state), vec!["still pending", "bank two"]);
        assert!(state.activate_next(22).is_none());

        let round = state
            .begin_settlement(RoundTrigger::Forced, Instant::now(), Duration::from_secs(22))
            .unwrap();
        assert!(state.current().is_none());
        // Still settling: no new round yet.
        assert!(state.activate_next(22).is_none());

        assert!(state.finish_settlement(round_id, round.topic));
        assert_eq!(state.past().unwrap().topic.text, "bank one");
        assert_eq!(state.activate_next(22).unwrap().topic.text, "bank two");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_trigger_requires_elapsed_countdown() {
        let mut state = RoundState::new(1);
        state.enqueue(successful("bank"));
        let round_id = state.activate_next(5).unwrap().round_id;
        let countdown = Duration::from_secs(5);

        assert!(
            state
                .begin_settlement(RoundTrigger::Deadline(round_id), Instant::now(), countdown)
                .is_none()
        );

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(
            state
                .begin_settlement(RoundTrigger::Deadline(Uuid::new_v4()), Instant::now(), countdown)
                .is_none()
        );

        let round = state
            .begin_settlement(RoundTrigger::Deadline(round_id), Instant::now(), countdown)
            .unwrap();
        assert_eq!(round.round_id, round_id);

        // Second trigger for the same round finds nothing to do.
        assert!(
            state
                .begin_settlement(RoundTrigger::Deadline(round_id), Instant::now(), countdown)
                .is_none()
        );
        assert!(
            state
                .begin_settlement(RoundTrigger::Forced, Instant::now(), countdown)
                .is_none()
        );
    }

    #[test]
    fn countdown_updates_only_for_current_round() {
        let mut state = RoundState::new(1);
        state.enqueue(successful("bank"));
        let round_id = state.activate_next(5).unwrap().round_id;

        assert!(state.set_countdown(round_id, 3));
        assert_eq!(state.current().unwrap().countdown, 3);
        assert!(!state.set_countdown(Uuid::new_v4(), 1));
    }

    #[test]
    fn known_texts_cover_current_pending_and_past() {
        let mut state = RoundState::new(1);
        state.enqueue(successful("past"));
        state.enqueue(successful("current"));
        let round_id = state.activate_next(5).unwrap().round_id;
        let round = state
            .begin_settlement(RoundTrigger::Forced, Instant::now(), Duration::from_secs(5))
            .unwrap();
        state.finish_settlement(round_id, round.topic);
        state.activate_next(5).unwrap();
        state.enqueue(bid(3, "pending"));

        let mut known: Vec<&str> = state.known_texts().collect();
        known.sort_unstable();
        assert_eq!(known, vec!["current", "past", "pending"]);
    }
}
