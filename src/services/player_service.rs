use tracing::info;

use crate::{
    dao::models::PlayerEntity,
    dto::play::PlayerResponse,
    error::ServiceError,
    state::{SharedState, topic::PlayerId},
};

/// Return the ledger record of `player`, creating it with the starting balance on first visit.
pub async fn ensure_player(
    state: &SharedState,
    player: &PlayerId,
) -> Result<PlayerResponse, ServiceError> {
    let store = state.require_store().await?;
    let _gate = state.ledger_gate().lock().await;

    if let Some(existing) = store.get_player(player.as_str()).await? {
        return Ok(existing.into());
    }

    let created = store
        .create_player(PlayerEntity::new(
            player.as_str(),
            state.config().initial_player_points,
        ))
        .await?;
    info!(%player, points = created.points, "player joined");
    Ok(created.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::trivia_store::{MemoryStore, PlayerLedger},
        llm::Oracles,
        state::AppState,
    };

    #[tokio::test]
    async fn first_visit_creates_the_record_once() {
        let state = AppState::new(AppConfig::default(), Oracles::disabled());
        let store = MemoryStore::new();
        state.install_store(Arc::new(store.clone())).await;
        let alice = PlayerId::new("alice");

        let first = ensure_player(&state, &alice).await.unwrap();
        assert_eq!(first.points, AppConfig::default().initial_player_points);
        assert_eq!(first.name, "alice");

        let mut record = store.get_player("alice").await.unwrap().unwrap();
        record.points = 7;
        store.update_player(record).await.unwrap();

        assert_eq!(ensure_player(&state, &alice).await.unwrap().points, 7);
    }

    #[tokio::test]
    async fn degraded_mode_is_reported() {
        let state = AppState::new(AppConfig::default(), Oracles::disabled());
        assert!(matches!(
            ensure_player(&state, &PlayerId::new("alice")).await,
            Err(ServiceError::Degraded)
        ));
    }
}
