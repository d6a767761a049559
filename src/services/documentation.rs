use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Trivia Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::play::me,
        crate::routes::play::bid,
        crate::routes::play::answer,
        crate::routes::public::get_leaderboard,
        crate::routes::public::get_online,
        crate::routes::public::get_round,
        crate::routes::admin::complete_round,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::play::BidRequest,
            crate::dto::play::BidReceipt,
            crate::dto::play::AnswerRequest,
            crate::dto::play::AnswerResponse,
            crate::dto::play::PlayerResponse,
            crate::dto::public::LeaderboardResponse,
            crate::dto::public::OnlineResponse,
            crate::dto::public::RoundResponse,
            crate::dto::fragment::Fragment,
            crate::dto::admin::CompletionResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "clients", description = "WebSocket feed of round fragments"),
        (name = "play", description = "Bids, answers and balance of the signed-in player"),
        (name = "public", description = "Read-only views of the round and the leaderboard"),
        (name = "admin", description = "Operator actions guarded by the admin token"),
    )
)]
pub struct ApiDoc;
