//! Artifact State Server - Binary Entry Point
//!
//! Starts the configured nodes and serves the HTTP API of the first
//! endpoint node until Ctrl-C.

use std::sync::Arc;

use tracing::{error, info};

use artifact_state::api::http::create_router;
use artifact_state::api::state::AppState;
use artifact_state::config::{AppConfig, StorageBackend};
use artifact_state::event_store::{EventLog, EventStoreConfig, JsonlEventStore, MemoryEventStore};
use artifact_state::observability::init_tracing;
use artifact_state::utils::format_duration;
use artifact_state::{AppResult, Cluster};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let log: Arc<dyn EventLog> = match config.storage {
        StorageBackend::File => {
            info!(data_dir = %config.data_dir.display(), "Using file event store");
            Arc::new(JsonlEventStore::new(EventStoreConfig::new(&config.data_dir)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory event store, state is lost on exit");
            Arc::new(MemoryEventStore::new())
        }
    };

    let cluster = Cluster::start(&config, log)?;
    info!(
        nodes = config.nodes.len(),
        shards = config.shard_count,
        "Cluster started"
    );

    let state = Arc::new(AppState::new(cluster.gateway().clone()));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        endpoint = %cluster.gateway().node_id(),
        ask_timeout = %format_duration(cluster.gateway().timeout()),
        "Server online"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cluster.shutdown().await;

    if let Err(err) = &served {
        error!(error = %err, "HTTP server failed");
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
