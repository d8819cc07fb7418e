//! Fanout engine: the dequeue loop and its lifecycle.
//!
//! The engine runs a single perpetual dequeue loop that atomically claims
//! events from the pending queue and spawns one tracked fanout task per
//! event. The loop never awaits a fanout; a semaphore bounds how many run
//! at once. Shutdown cancels the loop and drains outstanding fanouts
//! within a configurable timeout.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use sluice_core::{ClaimedEvent, Clock};
use tokio::{
    sync::{RwLock, Semaphore},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info, warn};

use crate::{
    client::{ClientConfig, DeliveryClient},
    error::{DeliveryError, Result},
    fanout::FanoutCoordinator,
    retry::RetryPolicy,
    store::QueueStore,
};

/// What to do with a claimed value that does not decode as an event.
///
/// The original behavior is `Deliver`: the raw payload is forwarded to
/// destinations as-is, indistinguishable from a well-formed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Forward the raw payload to destinations anyway.
    #[default]
    Deliver,
    /// Skip delivery; the in-flight entry is still cleaned up.
    Drop,
    /// Route the raw payload to the dead-letter list, then clean up.
    DeadLetter,
}

/// Configuration for the fanout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// List the producers push serialized events onto.
    pub pending_queue_key: String,

    /// List holding events currently being fanned out.
    pub in_flight_key: String,

    /// Optional list receiving events that exhausted their retries.
    /// Unset by default: exhaustion is silent, as originally built.
    pub dead_letter_key: Option<String>,

    /// Destination endpoints, attempted in this order on every fanout.
    pub endpoints: Vec<String>,

    /// Pause between dequeue polls, applied after every iteration.
    pub idle_interval: Duration,

    /// Cap on simultaneously running fanout tasks.
    pub max_concurrent_fanouts: usize,

    /// HTTP client configuration.
    pub client_config: ClientConfig,

    /// Per-destination retry policy.
    pub retry_policy: RetryPolicy,

    /// Handling of claimed values that fail to decode.
    pub decode_policy: DecodePolicy,

    /// Maximum time to wait for outstanding fanouts during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            pending_queue_key: "queued_events".to_string(),
            in_flight_key: "processing_events".to_string(),
            dead_letter_key: None,
            endpoints: Vec::new(),
            idle_interval: crate::DEFAULT_IDLE_INTERVAL,
            max_concurrent_fanouts: crate::DEFAULT_MAX_CONCURRENT_FANOUTS,
            client_config: ClientConfig::default(),
            retry_policy: RetryPolicy::default(),
            decode_policy: DecodePolicy::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for engine monitoring, surfaced by the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Events claimed from the pending queue since startup.
    pub events_dequeued: u64,
    /// Fanout tasks currently running.
    pub fanouts_in_flight: u64,
    /// Per-destination deliveries that succeeded.
    pub deliveries_succeeded: u64,
    /// Per-destination deliveries abandoned after retry exhaustion.
    pub deliveries_exhausted: u64,
    /// Events routed to the dead-letter list.
    pub events_dead_lettered: u64,
    /// Claimed values that failed to decode as events.
    pub decode_failures: u64,
    /// In-flight cleanup operations that failed, stranding an entry.
    pub cleanup_failures: u64,
}

/// The fanout engine: owns the dequeue loop and supervises fanout tasks.
pub struct FanoutEngine {
    config: Arc<FanoutConfig>,
    coordinator: Arc<FanoutCoordinator>,
    store: Arc<dyn QueueStore>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
    clock: Arc<dyn Clock>,
    loop_handle: Option<JoinHandle<()>>,
}

impl FanoutEngine {
    /// Creates an engine over the given store and configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built from the
    /// configuration.
    pub fn new(
        store: Arc<dyn QueueStore>,
        config: FanoutConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Arc::new(DeliveryClient::new(config.client_config.clone())?);
        let config = Arc::new(config);
        let stats = Arc::new(RwLock::new(EngineStats::default()));
        let coordinator = Arc::new(FanoutCoordinator::new(
            store.clone(),
            client,
            config.clone(),
            stats.clone(),
            clock.clone(),
        ));

        Ok(Self {
            config,
            coordinator,
            store,
            stats,
            cancellation_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            clock,
            loop_handle: None,
        })
    }

    /// Spawns the dequeue loop. Returns immediately.
    pub fn start(&mut self) {
        info!(
            pending_queue = %self.config.pending_queue_key,
            in_flight = %self.config.in_flight_key,
            endpoints = self.config.endpoints.len(),
            max_concurrent_fanouts = self.config.max_concurrent_fanouts,
            "starting fanout engine"
        );

        let dequeue_loop = DequeueLoop {
            store: self.store.clone(),
            config: self.config.clone(),
            coordinator: self.coordinator.clone(),
            stats: self.stats.clone(),
            cancellation_token: self.cancellation_token.clone(),
            tracker: self.tracker.clone(),
            clock: self.clock.clone(),
            fanout_slots: Arc::new(Semaphore::new(self.config.max_concurrent_fanouts)),
        };

        self.loop_handle = Some(tokio::spawn(dequeue_loop.run()));
    }

    /// Gracefully shuts down the engine.
    ///
    /// Signals the dequeue loop to stop claiming events, then waits for
    /// the loop and every outstanding fanout to finish. In-flight delivery
    /// attempts are never cancelled mid-flight.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if the drain exceeds the configured
    /// deadline; fanout tasks may still be running in that case.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down fanout engine");

        self.cancellation_token.cancel();
        self.tracker.close();

        let loop_handle = self.loop_handle.take();
        let tracker = self.tracker.clone();
        let drain = async move {
            if let Some(handle) = loop_handle {
                if let Err(join_error) = handle.await {
                    error!(error = %join_error, "dequeue loop task panicked");
                }
            }
            tracker.wait().await;
        };

        match tokio::time::timeout(self.config.shutdown_timeout, drain).await {
            Ok(()) => {
                info!("fanout engine drained");
                Ok(())
            },
            Err(_elapsed) => {
                error!(
                    timeout_seconds = self.config.shutdown_timeout.as_secs(),
                    "shutdown timed out, some fanouts may still be running"
                );
                Err(DeliveryError::ShutdownTimeout { timeout: self.config.shutdown_timeout })
            },
        }
    }

    /// Snapshot of the engine counters.
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    /// Shared handle to the live counters, for the health endpoint.
    pub fn stats_handle(&self) -> Arc<RwLock<EngineStats>> {
        self.stats.clone()
    }
}

/// The perpetual polling loop.
struct DequeueLoop {
    store: Arc<dyn QueueStore>,
    config: Arc<FanoutConfig>,
    coordinator: Arc<FanoutCoordinator>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
    clock: Arc<dyn Clock>,
    fanout_slots: Arc<Semaphore>,
}

impl DequeueLoop {
    /// Polls the pending queue until cancelled.
    ///
    /// An empty queue and a store error look the same from the loop's
    /// perspective: nothing to do until the next poll. Polling at a fixed
    /// interval bounds store load at the cost of up to one interval of
    /// latency per event.
    async fn run(self) {
        info!("dequeue loop starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            // Take a fanout slot before the store move so a saturated
            // worker never claims an event it cannot start processing.
            let permit = tokio::select! {
                permit = self.fanout_slots.clone().acquire_owned() => {
                    match permit {
                        Ok(permit) => permit,
                        Err(_closed) => break,
                    }
                }
                () = self.cancellation_token.cancelled() => break,
            };

            match self
                .store
                .move_tail(&self.config.pending_queue_key, &self.config.in_flight_key)
                .await
            {
                Ok(Some(raw)) => {
                    let claimed = ClaimedEvent::decode(raw);
                    {
                        let mut stats = self.stats.write().await;
                        stats.events_dequeued += 1;
                        if claimed.event.is_none() {
                            stats.decode_failures += 1;
                        }
                    }
                    if claimed.event.is_none() {
                        warn!("claimed value did not decode as an event");
                    }

                    let coordinator = self.coordinator.clone();
                    self.tracker.spawn(async move {
                        coordinator.fanout(claimed).await;
                        drop(permit);
                    });
                },
                Ok(None) => drop(permit),
                Err(error) => {
                    warn!(error = %error, "dequeue poll failed");
                    drop(permit);
                },
            }

            tokio::select! {
                () = self.clock.sleep(self.config.idle_interval) => {}
                () = self.cancellation_token.cancelled() => break,
            }
        }

        info!("dequeue loop stopped");
    }
}
