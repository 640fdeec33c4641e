//! Telemetry Relay - Binary Entry Point
//!
//! Reads configuration from the environment, serves `/ws` and the REST
//! endpoints, and flushes buffered points on shutdown.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use telemetry_relay::api::{create_router, AppState};
use telemetry_relay::simulation::{Simulator, StreamCatalog};
use telemetry_relay::{
    ChannelTransport, JsonlStore, JsonlStoreConfig, MemoryStore, RelayConfig, RelayResult,
    TelemetryHub, TelemetryStore,
};

#[tokio::main]
async fn main() -> RelayResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("telemetry_relay=info,tower_http=info")),
        )
        .init();

    let config = RelayConfig::from_env();
    config.validate()?;

    let store: Arc<dyn TelemetryStore> = match &config.data_dir {
        Some(dir) => Arc::new(JsonlStore::open(JsonlStoreConfig::new(dir))?),
        None => Arc::new(MemoryStore::new()),
    };

    let transport = Arc::new(ChannelTransport::new(config.channel_capacity));
    let hub = Arc::new(TelemetryHub::new(&config, store, transport.clone()));
    let flush = hub.start_flush_scheduler();

    let simulation = config.simulate.then(|| {
        Simulator::new(
            hub.clone(),
            StreamCatalog::from_path(config.catalog_path.clone()),
            config.simulation_interval,
        )
        .spawn()
    });

    let app = create_router(Arc::new(AppState::new(hub, transport)));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        batch_size = config.batch_size,
        flush_interval_ms = config.flush_interval.as_millis() as u64,
        persistent = config.data_dir.is_some(),
        "telemetry relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(simulation) = simulation {
        simulation.stop().await;
    }
    flush.shutdown().await;
    info!("telemetry relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
