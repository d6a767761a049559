use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use crate::{error::AppError, state::topic::PlayerId};

/// Header carrying the session identity issued by the authentication layer.
pub const SESSION_HEADER: &str = "x-session-id";

/// Identity of the calling player, taken from the `x-session-id` header.
#[derive(Debug, Clone)]
pub struct Session(pub PlayerId);

impl Session {
    /// Read the session header, ignoring blank values.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Session(PlayerId::new(value)))
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized(format!("missing session header `{SESSION_HEADER}`"))
        })
    }
}
