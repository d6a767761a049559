//! Pipeline lanes pulling pending topics through validation and question generation.

use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    llm::{Verdict, within},
    services::{broadcast, director},
    state::{
        SharedState,
        round::{Claim, StageOutcome},
        topic::{TopicId, TopicStatus},
    },
};

/// Pause of a lane that found nothing to claim.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(100);
/// Latency of settling a bank topic, which needs no external call.
pub const BANK_SETTLE_LATENCY: Duration = Duration::from_secs(1);

/// Spawn one task per configured lane.
pub fn spawn_lanes(state: &SharedState) -> Vec<JoinHandle<()>> {
    (0..state.config().pipeline_workers)
        .map(|lane| tokio::spawn(run_lane(state.clone(), lane)))
        .collect()
}

/// Claim and advance topics forever.
pub async fn run_lane(state: SharedState, lane: usize) {
    info!(lane, "pipeline lane started");
    loop {
        if !step(&state, lane).await {
            sleep(IDLE_BACKOFF).await;
        }
    }
}

/// Advance one topic by one stage. Returns `false` when nothing was eligible.
pub async fn step(state: &SharedState, lane: usize) -> bool {
    let claim = state.round().lock().await.claim_next(lane);
    let Some(claim) = claim else {
        return false;
    };

    debug!(lane, topic_id = %claim.topic_id, status = ?claim.status, "claimed topic");
    let outcome = advance(state, &claim).await;
    commit(state, &claim, outcome).await;
    true
}

/// Run the stage matching the claimed status. The round lock is not held here.
async fn advance(state: &SharedState, claim: &Claim) -> Option<StageOutcome> {
    if claim.from_bank {
        sleep(BANK_SETTLE_LATENCY).await;
        return Some(StageOutcome::Settled);
    }

    let limit = state.config().llm.timeout();
    let oracles = state.oracles();

    match claim.status {
        TopicStatus::Pending => {
            let verdict = within(limit, oracles.validator.validate(&claim.text)).await;
            Some(match verdict {
                Ok(Verdict::Accept) => StageOutcome::Accepted,
                Ok(Verdict::Reject) => {
                    info!(topic_id = %claim.topic_id, "validator rejected topic");
                    StageOutcome::Failed
                }
                Err(err) => {
                    warn!(topic_id = %claim.topic_id, error = %err, "topic validation failed");
                    StageOutcome::Failed
                }
            })
        }
        TopicStatus::Computing => {
            let question = within(limit, oracles.generator.generate(&claim.text)).await;
            Some(match question {
                Ok(question) => StageOutcome::Generated(question),
                Err(err) => {
                    warn!(topic_id = %claim.topic_id, error = %err, "question generation failed");
                    StageOutcome::Failed
                }
            })
        }
        TopicStatus::Successful | TopicStatus::Failed => None,
    }
}

/// Apply the outcome under the round lock, release the claim, then fan out.
async fn commit(state: &SharedState, claim: &Claim, outcome: Option<StageOutcome>) {
    let applied = {
        let mut round = state.round().lock().await;
        let applied = outcome.map(|outcome| round.apply_outcome(claim.topic_id, outcome));
        round.release(claim.lane, claim.topic_id);
        applied
    };

    let status = match applied {
        Some(Ok(status)) => status,
        Some(Err(err)) => {
            debug!(lane = claim.lane, error = %err, "discarding stage outcome");
            return;
        }
        None => return,
    };

    debug!(lane = claim.lane, topic_id = %claim.topic_id, ?status, "topic advanced");
    broadcast::broadcast_next_topics(state).await;

    match status {
        TopicStatus::Successful => {
            director::consume_next(state).await;
        }
        TopicStatus::Failed => schedule_removal(state, claim.topic_id),
        TopicStatus::Pending | TopicStatus::Computing => {}
    }
}

/// Drop a failed topic once the UI had time to show it.
fn schedule_removal(state: &SharedState, topic_id: TopicId) {
    let state = state.clone();
    let retention = state.config().failed_retention();
    tokio::spawn(async move {
        sleep(retention).await;
        let removed = state.round().lock().await.remove_if_failed(topic_id);
        if removed {
            debug!(%topic_id, "removed failed topic");
            broadcast::broadcast_next_topics(&state).await;
        }
    });
}
