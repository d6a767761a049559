use serde::Serialize;
use utoipa::ToSchema;

/// Result of forcing the active round to complete.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompletionResponse {
    /// Whether a round was active and got settled.
    pub completed: bool,
}
