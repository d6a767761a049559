use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let connections = state.hub().connection_count();
    if state.is_degraded() {
        HealthResponse::degraded(connections)
    } else {
        HealthResponse::ok(connections)
    }
}
