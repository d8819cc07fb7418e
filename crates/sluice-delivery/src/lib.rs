//! Webhook fanout engine with reliability guarantees.
//!
//! This crate implements the delivery pipeline: events are atomically moved
//! from the pending queue to the in-flight list, fanned out to every
//! configured destination with per-destination exponential backoff, and
//! removed from the in-flight list once all destinations have concluded.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  LMOVE   ┌──────────────────┐  POST   ┌──────────────┐
//! │ DequeueLoop │─────────▶│ FanoutCoordinator│────────▶│ Destinations │
//! └─────────────┘          └──────────────────┘         └──────────────┘
//!        │                          │ LREM
//!        ▼                          ▼
//! ┌─────────────┐          ┌──────────────────┐
//! │ Pending     │          │ In-Flight List   │
//! │ Queue       │          │ (crash marker)   │
//! └─────────────┘          └──────────────────┘
//! ```
//!
//! # Key Properties
//!
//! - **Atomic claim** - `LMOVE` moves one event at a time into the
//!   in-flight list, so a crash never loses a claimed event silently
//! - **No short-circuit** - every destination is attempted on every fanout
//!   pass, regardless of earlier failures
//! - **Unconditional cleanup** - the in-flight entry is removed after the
//!   fanout concludes, delivered or not
//! - **Bounded concurrency** - a semaphore caps simultaneous fanouts
//! - **Graceful shutdown** - outstanding fanouts drain before exit
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sluice_core::RealClock;
//! use sluice_delivery::{FanoutConfig, FanoutEngine};
//! use sluice_delivery::store::QueueStore;
//!
//! # async fn example(store: Arc<dyn QueueStore>) -> sluice_delivery::Result<()> {
//! let config = FanoutConfig {
//!     endpoints: vec!["https://dest.example.com/hook".into()],
//!     ..FanoutConfig::default()
//! };
//! let mut engine = FanoutEngine::new(store, config, Arc::new(RealClock))?;
//! engine.start();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod retry;
pub mod store;

// Re-export main public API
pub use engine::{DecodePolicy, EngineStats, FanoutConfig, FanoutEngine};
pub use error::{DeliveryError, Result};

use std::time::Duration;

/// Default number of additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default pause between dequeue polls.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Default cap on simultaneously running fanouts.
pub const DEFAULT_MAX_CONCURRENT_FANOUTS: usize = 64;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
