use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::play::SessionQuery,
    routes::session::Session,
    services::websocket_service,
    state::{SharedState, hub::ClientKey, topic::PlayerId},
};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "clients",
    params(SessionQuery),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a client WebSocket receiving round fragments.
///
/// The session comes from the `x-session-id` header or the `session` query
/// parameter; without either the connection joins the unassigned bucket.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let key = client_key(&headers, query);
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, key))
}

fn client_key(headers: &HeaderMap, query: SessionQuery) -> ClientKey {
    Session::from_headers(headers)
        .map(|Session(player)| player)
        .or_else(|| {
            query
                .session
                .map(|session| session.trim().to_owned())
                .filter(|session| !session.is_empty())
                .map(PlayerId::new)
        })
        .map(ClientKey::Player)
        .unwrap_or(ClientKey::Unassigned)
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::routes::session::SESSION_HEADER;

    #[test]
    fn header_wins_over_query_and_absence_is_unassigned() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            client_key(&headers, SessionQuery::default()),
            ClientKey::Unassigned
        );

        let query = SessionQuery {
            session: Some("bob".into()),
        };
        assert_eq!(
            client_key(&headers, query),
            ClientKey::Player(PlayerId::new("bob"))
        );

        headers.insert(SESSION_HEADER, HeaderValue::from_static("alice"));
        let query = SessionQuery {
            session: Some("bob".into()),
        };
        assert_eq!(
            client_key(&headers, query),
            ClientKey::Player(PlayerId::new("alice"))
        );
    }
}
