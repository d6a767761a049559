use tracing::debug;

use crate::{
    dto::fragment::{AnswerSelected, Fragment},
    error::ServiceError,
    services::broadcast,
    state::{
        SharedState,
        hub::Recipients,
        state_machine::RoundId,
        topic::{OptionLabel, PlayerId},
    },
};

/// Record `choice` for `player` on the current round; a later choice replaces an earlier one.
///
/// Fails with [`ServiceError::NoActiveRound`] when no round accepts answers.
pub async fn record_answer(
    state: &SharedState,
    player: &PlayerId,
    choice: OptionLabel,
) -> Result<RoundId, ServiceError> {
    let (round_id, sheet) = {
        let round = state.round().lock().await;
        let current = round.current().ok_or(ServiceError::NoActiveRound)?;
        (current.round_id, current.sheet.clone())
    };

    if !sheet.lock().await.record(player.clone(), choice) {
        return Err(ServiceError::NoActiveRound);
    }

    debug!(%player, %round_id, %choice, "answer recorded");
    broadcast::announce(
        state,
        &Recipients::Player(player.clone()),
        &Fragment::AnswerSelected(AnswerSelected { round_id, choice }),
    );
    Ok(round_id)
}
