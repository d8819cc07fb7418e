//! Sluice webhook fanout worker.
//!
//! Main entry point. Initializes tracing, loads configuration, connects
//! to the queue store, starts the fanout engine, and coordinates graceful
//! startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sluice_api::{AppState, Config};
use sluice_core::{RealClock, RedisStore};
use sluice_delivery::{store::RedisQueueStore, FanoutEngine};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting Sluice webhook fanout worker");

    // Load configuration from defaults, config.toml, and environment
    let config = Config::load()?;
    info!(
        redis_url = %config.redis_url_masked(),
        pending_queue = %config.pending_queue_key,
        in_flight = %config.in_flight_key,
        endpoints = config.endpoints.len(),
        "Configuration loaded"
    );

    // Connect to the queue store; an unreachable store at startup is fatal
    let store = connect_store(&config).await?;
    info!("Queue store connection established");

    let clock = Arc::new(RealClock::new());
    let mut engine = FanoutEngine::new(
        Arc::new(RedisQueueStore::new(store.clone())),
        config.to_fanout_config(),
        clock.clone(),
    )?;
    engine.start();

    // Administrative HTTP listener for liveness and readiness probes
    let state = AppState {
        store: Arc::new(RedisQueueStore::new(store)),
        clock,
        stats: engine.stats_handle(),
    };
    let addr = config.parse_server_addr()?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = sluice_api::start_server(state, addr).await {
            error!(error = %e, "Administrative server failed");
        }
    });

    info!(addr = %addr, "Sluice is delivering events");

    // Wait for shutdown signal, then stop claiming and drain in-flight work
    shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown");

    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "Engine did not drain cleanly");
    }
    server_handle.abort();

    info!("Sluice shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,sluice=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Connects to the queue store with bounded retry.
///
/// The worker cannot do anything without its store, so a store that stays
/// unreachable past the retry budget terminates the process.
async fn connect_store(config: &Config) -> Result<RedisStore> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;
    loop {
        let attempt = async {
            let store = RedisStore::connect(&config.redis_url).await?;
            store.ping().await?;
            Ok::<_, sluice_core::CoreError>(store)
        };

        match attempt.await {
            Ok(store) => return Ok(store),
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Queue store connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to connect to the queue store after retries");
            },
        }
    }
}

/// Waits for a shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        () = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
