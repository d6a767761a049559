use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::{LeaderboardResponse, OnlineResponse, RoundResponse},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints that expose the round and the ledger.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/leaderboard", get(get_leaderboard))
        .route("/public/online", get(get_online))
        .route("/public/round", get(get_round))
}

#[utoipa::path(
    get,
    path = "/public/leaderboard",
    tag = "public",
    responses(
        (status = 200, description = "Top players by points", body = LeaderboardResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Return the top players by points.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(public_service::get_leaderboard(&state).await?))
}

#[utoipa::path(
    get,
    path = "/public/online",
    tag = "public",
    responses((status = 200, description = "Connected players", body = OnlineResponse))
)]
/// Return the players currently connected.
pub async fn get_online(State(state): State<SharedState>) -> Json<OnlineResponse> {
    Json(public_service::get_online(&state))
}

#[utoipa::path(
    get,
    path = "/public/round",
    tag = "public",
    responses((status = 200, description = "Current round snapshot", body = RoundResponse))
)]
/// Return the current question, the pending list head and the last result.
pub async fn get_round(State(state): State<SharedState>) -> Json<RoundResponse> {
    Json(public_service::get_round(&state).await)
}
