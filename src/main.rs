//! Trivia Back binary entrypoint wiring the round pipeline, REST, WebSocket, and storage layers.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivia_back::{
    config::AppConfig,
    dao::trivia_store::MemoryStore,
    llm::Oracles,
    routes,
    services::{monitor, pipeline},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let oracles = Oracles::from_config(&config.llm).unwrap_or_else(|err| {
        warn!(error = %err, "language model backend unavailable; player topics will fail");
        Oracles::disabled()
    });

    let app_state = AppState::new(config, oracles);
    start_storage(&app_state).await.context("starting storage")?;

    pipeline::spawn_lanes(&app_state);
    monitor::spawn(&app_state);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store, or supervise the MongoDB connection in the background.
async fn start_storage(state: &SharedState) -> anyhow::Result<()> {
    let backend = env::var("TRIVIA_STORE").unwrap_or_else(|_| "mongo".into());
    match backend.as_str() {
        "memory" => {
            let store = match env::var("QUESTION_BANK_PATH").ok().map(PathBuf::from) {
                Some(path) => MemoryStore::load_bank(&path)
                    .with_context(|| format!("loading question bank `{}`", path.display()))?,
                None => MemoryStore::new(),
            };
            info!(bank = store.bank_size(), "using in-memory storage");
            state.install_store(Arc::new(store)).await;
            Ok(())
        }
        "mongo" => spawn_mongo_supervisor(state),
        other => anyhow::bail!("unknown TRIVIA_STORE `{other}` (expected `mongo` or `memory`)"),
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use trivia_back::{
        dao::{
            storage::StorageError,
            trivia_store::{
                TriviaStore,
                mongodb::{MongoConfig, MongoTriviaStore},
            },
        },
        services::storage_supervisor,
    };

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoTriviaStore::connect(config).await?;
            Ok::<Arc<dyn TriviaStore>, StorageError>(Arc::new(store))
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    anyhow::bail!("built without the `mongo-store` feature; set TRIVIA_STORE=memory")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
