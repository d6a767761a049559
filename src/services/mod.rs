/// Answer intake for the current round.
pub mod answers;
/// Bid acceptance and stake deduction.
pub mod bid_service;
/// Fragment rendering and delivery through the connection hub.
pub mod broadcast;
/// Round activation, countdown and settlement.
pub mod director;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question bank refills of the pending queue.
pub mod monitor;
/// Pipeline lanes advancing topics through validation and generation.
pub mod pipeline;
/// Player ledger bootstrap.
pub mod player_service;
/// Public service for read-only round information.
pub mod public_service;
/// Winners, rewards and streak bonuses.
pub mod scoring;
/// Character similarity for duplicate and adversarial topic detection.
pub mod similarity;
/// Storage connection supervisor with back-off.
pub mod storage_supervisor;
/// WebSocket connection handling.
pub mod websocket_service;
