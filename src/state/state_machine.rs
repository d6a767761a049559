use thiserror::Error;
use uuid::Uuid;

/// Identifier of one activation of a topic as the current question.
pub type RoundId = Uuid;

/// High-level phases a round goes through. Re-entrant: `Idle` follows `Settling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No current topic; the director may activate the next successful one.
    Idle,
    /// A topic is current and answers are being collected.
    Active {
        /// Round being played.
        round_id: RoundId,
    },
    /// The countdown ended; scores are being applied and announced.
    Settling {
        /// Round being settled.
        round_id: RoundId,
    },
}

/// Events that can be applied to the round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// A successful topic becomes current.
    Activate(RoundId),
    /// The countdown elapsed or completion was forced.
    Expire(RoundId),
    /// Scores were applied and the past topic announced.
    Settled(RoundId),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoundPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoundEvent,
}

/// State machine guarding the `Idle -> Active -> Settling -> Idle` round cycle.
///
/// Events carry the round identifier they refer to, so a late event from a
/// superseded round can never move a newer round forward.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    phase: RoundPhase,
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
        }
    }
}

impl RoundStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoundPhase::Idle, RoundEvent::Activate(round_id)) => RoundPhase::Active { round_id },
            (RoundPhase::Active { round_id }, RoundEvent::Expire(expired)) if round_id == expired => {
                RoundPhase::Settling { round_id }
            }
            (RoundPhase::Settling { round_id }, RoundEvent::Settled(settled))
                if round_id == settled =>
            {
                RoundPhase::Idle
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
