//! Request and response bodies of the player endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::PlayerEntity, state::topic::OptionLabel};

/// A bid: stake `points` to have `topic` played.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BidRequest {
    /// Proposed topic text.
    #[validate(length(min = 1, max = 256))]
    pub topic: String,
    /// Stake, deducted from the balance on acceptance.
    #[validate(range(min = 1))]
    pub points: u32,
}

/// Accepted bid.
#[derive(Debug, Serialize, ToSchema)]
pub struct BidReceipt {
    /// Identifier of the queued topic.
    pub topic_id: Uuid,
    /// Balance after the stake was deducted.
    pub balance: i64,
}

/// Answer to the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// Selected option.
    pub choice: OptionLabel,
}

/// Whether the answer was recorded.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    /// `false` when no round accepts answers.
    pub recorded: bool,
}

/// Ledger record of the calling player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerResponse {
    /// Session identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current balance.
    pub points: i64,
}

impl From<PlayerEntity> for PlayerResponse {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            points: value.points,
        }
    }
}

/// Query accepted by the websocket upgrade.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// Session identity, when the header cannot be set.
    pub session: Option<String>,
}
