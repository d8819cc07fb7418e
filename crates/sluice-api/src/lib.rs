//! Sluice HTTP surface and configuration.
//!
//! The worker exposes a small administrative router for liveness and
//! readiness probes; webhook delivery itself never flows through HTTP
//! ingestion. Configuration is layered from defaults, `config.toml`, and
//! environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;

use std::sync::Arc;

use sluice_core::Clock;
use sluice_delivery::{store::QueueStore, EngineStats};
use tokio::sync::RwLock;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared state for the administrative router.
#[derive(Clone)]
pub struct AppState {
    /// Queue store handle, pinged by readiness checks.
    pub store: Arc<dyn QueueStore>,
    /// Clock used for response timestamps.
    pub clock: Arc<dyn Clock>,
    /// Live delivery counters from the fanout engine.
    pub stats: Arc<RwLock<EngineStats>>,
}
