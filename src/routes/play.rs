use axum::{Json, Router, extract::State, routing::{get, post}};
use axum_valid::Valid;

use crate::{
    dto::play::{AnswerRequest, AnswerResponse, BidReceipt, BidRequest, PlayerResponse},
    error::{AppError, ServiceError},
    routes::session::Session,
    services::{answers, bid_service, player_service},
    state::SharedState,
};

/// Endpoints used by signed-in players.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(me))
        .route("/bid", post(bid))
        .route("/answer", post(answer))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "play",
    params(("X-Session-Id" = String, Header, description = "Session identity")),
    responses(
        (status = 200, description = "Ledger record of the caller, created on first visit", body = PlayerResponse),
        (status = 401, description = "Missing session"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Return the caller's balance, creating the player on first visit.
pub async fn me(
    State(state): State<SharedState>,
    Session(player): Session,
) -> Result<Json<PlayerResponse>, AppError> {
    Ok(Json(player_service::ensure_player(&state, &player).await?))
}

#[utoipa::path(
    post,
    path = "/bid",
    tag = "play",
    params(("X-Session-Id" = String, Header, description = "Session identity")),
    request_body = BidRequest,
    responses(
        (status = 200, description = "Bid accepted and topic queued", body = BidReceipt),
        (status = 400, description = "Invalid bid or insufficient points"),
        (status = 409, description = "Topic too similar to an existing one"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Stake points to have a topic played.
pub async fn bid(
    State(state): State<SharedState>,
    Session(player): Session,
    Valid(Json(request)): Valid<Json<BidRequest>>,
) -> Result<Json<BidReceipt>, AppError> {
    Ok(Json(bid_service::place_bid(&state, &player, request).await?))
}

#[utoipa::path(
    post,
    path = "/answer",
    tag = "play",
    params(("X-Session-Id" = String, Header, description = "Session identity")),
    request_body = AnswerRequest,
    responses((status = 200, description = "Whether the answer was recorded", body = AnswerResponse))
)]
/// Lock in a choice for the current question.
pub async fn answer(
    State(state): State<SharedState>,
    Session(player): Session,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let recorded = match answers::record_answer(&state, &player, request.choice).await {
        Ok(_) => true,
        Err(ServiceError::NoActiveRound) => false,
        Err(err) => return Err(err.into()),
    };
    Ok(Json(AnswerResponse { recorded }))
}
