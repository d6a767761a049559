use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Live websocket connections.
    pub connections: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connections: usize) -> Self {
        Self {
            status: "ok".to_string(),
            connections,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(connections: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            connections,
        }
    }
}
