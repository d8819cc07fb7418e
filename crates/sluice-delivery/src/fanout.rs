//! Fanout coordination: one event, every destination, then cleanup.
//!
//! Destinations are attempted sequentially in configuration order and a
//! failure never short-circuits the pass: a destination that exhausts its
//! retries does not prevent later destinations from being attempted. After
//! the pass concludes the in-flight entry is removed, unconditionally.

use std::sync::Arc;

use bytes::Bytes;
use sluice_core::{ClaimedEvent, Clock};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    client::{DeliveryClient, DeliveryRequest},
    engine::{DecodePolicy, EngineStats, FanoutConfig},
    retry::DeliveryOutcome,
    store::QueueStore,
};

/// Delivers one claimed event to every configured destination.
pub struct FanoutCoordinator {
    store: Arc<dyn QueueStore>,
    client: Arc<DeliveryClient>,
    config: Arc<FanoutConfig>,
    stats: Arc<RwLock<EngineStats>>,
    clock: Arc<dyn Clock>,
}

impl FanoutCoordinator {
    /// Creates a coordinator sharing the engine's store, client, and stats.
    pub fn new(
        store: Arc<dyn QueueStore>,
        client: Arc<DeliveryClient>,
        config: Arc<FanoutConfig>,
        stats: Arc<RwLock<EngineStats>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, client, config, stats, clock }
    }

    /// Runs one complete fanout pass for a claimed event.
    ///
    /// Every destination is attempted (subject to the decode policy), the
    /// event is dead-lettered when configured and applicable, and the
    /// in-flight entry is cleaned up regardless of delivery outcome.
    pub async fn fanout(&self, claimed: ClaimedEvent) {
        {
            let mut stats = self.stats.write().await;
            stats.fanouts_in_flight += 1;
        }

        let deliver = claimed.event.is_some()
            || matches!(self.config.decode_policy, DecodePolicy::Deliver);
        let mut exhausted_any = false;

        if deliver {
            for endpoint in &self.config.endpoints {
                match self.deliver_with_retry(endpoint, &claimed).await {
                    DeliveryOutcome::Delivered { attempts } => {
                        {
                            let mut stats = self.stats.write().await;
                            stats.deliveries_succeeded += 1;
                        }
                        info!(
                            endpoint,
                            attempts,
                            user_id = claimed.user_id().unwrap_or("unknown"),
                            "event delivered"
                        );
                    },
                    DeliveryOutcome::Exhausted { attempts } => {
                        exhausted_any = true;
                        {
                            let mut stats = self.stats.write().await;
                            stats.deliveries_exhausted += 1;
                        }
                        warn!(
                            endpoint,
                            attempts,
                            user_id = claimed.user_id().unwrap_or("unknown"),
                            "delivery abandoned after exhausting retries"
                        );
                    },
                }
            }
        } else {
            debug!("undecodable event not delivered under current decode policy");
        }

        let undeliverable = claimed.event.is_none()
            && matches!(self.config.decode_policy, DecodePolicy::DeadLetter);
        if exhausted_any || undeliverable {
            self.dead_letter(&claimed).await;
        }

        self.cleanup(&claimed).await;

        {
            let mut stats = self.stats.write().await;
            stats.fanouts_in_flight -= 1;
        }
    }

    /// Attempts delivery to one destination, retrying with exponential
    /// backoff until success or exhaustion.
    ///
    /// Attempt 0 is always made. After a failure the retry counter is
    /// incremented; once it exceeds `max_retries` the delivery is abandoned
    /// and only the outcome is reported. Any success returns immediately.
    async fn deliver_with_retry(&self, endpoint: &str, claimed: &ClaimedEvent) -> DeliveryOutcome {
        let mut retry = 0_u32;
        loop {
            let request = DeliveryRequest {
                delivery_id: Uuid::new_v4(),
                url: endpoint.to_string(),
                body: Bytes::from(claimed.raw.clone()),
                attempt_number: retry + 1,
            };

            match self.client.deliver(request).await {
                Ok(_response) => return DeliveryOutcome::Delivered { attempts: retry + 1 },
                Err(error) => {
                    retry += 1;
                    if retry > self.config.retry_policy.max_retries {
                        return DeliveryOutcome::Exhausted { attempts: retry };
                    }

                    let delay = self.config.retry_policy.backoff.delay(retry);
                    debug!(
                        endpoint,
                        retry,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "delivery attempt failed, backing off"
                    );
                    self.clock.sleep(delay).await;
                },
            }
        }
    }

    /// Routes the raw event to the dead-letter list, when one is configured.
    async fn dead_letter(&self, claimed: &ClaimedEvent) {
        let Some(key) = self.config.dead_letter_key.as_deref() else {
            return;
        };

        match self.store.push(key, &claimed.raw).await {
            Ok(()) => {
                let mut stats = self.stats.write().await;
                stats.events_dead_lettered += 1;
                warn!(dead_letter_key = key, "event routed to dead-letter list");
            },
            Err(error) => {
                error!(
                    dead_letter_key = key,
                    error = %error,
                    "failed to push event to dead-letter list"
                );
            },
        }
    }

    /// Removes every occurrence of the claimed raw string from the
    /// in-flight list. A failure here strands the entry: there is no
    /// automatic retry and the condition requires operator intervention.
    async fn cleanup(&self, claimed: &ClaimedEvent) {
        match self.store.remove_all(&self.config.in_flight_key, &claimed.raw).await {
            Ok(removed) => {
                debug!(removed, "in-flight entry cleaned up");
            },
            Err(error) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.cleanup_failures += 1;
                }
                error!(
                    error = %error,
                    "in-flight cleanup failed, entry stranded until operator intervention"
                );
            },
        }
    }
}
