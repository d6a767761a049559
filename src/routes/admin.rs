use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use crate::{dto::admin::CompletionResponse, error::AppError, services::director, state::SharedState};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Operator endpoints guarded by the configured admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/round/complete", post(complete_round))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

#[utoipa::path(
    post,
    path = "/admin/round/complete",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses(
        (status = 200, description = "Active round settled, if any", body = CompletionResponse),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
/// Settle the active round now and move on to the next topic.
pub async fn complete_round(State(state): State<SharedState>) -> Json<CompletionResponse> {
    let completed = director::force_complete(&state).await;
    Json(CompletionResponse { completed })
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token.as_deref() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized("no admin token configured".into())),
    }
}
