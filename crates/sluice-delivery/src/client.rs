//! HTTP dispatcher for destination delivery attempts.
//!
//! Issues one POST per attempt and classifies the outcome: transport
//! failures and any status other than `200 OK` are failures, exactly
//! `200 OK` is success. Response bodies are never inspected.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::{DeliveryError, Result};

/// Configuration for the destination HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout applied to each delivery attempt.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: "Sluice-Fanout/1.0".to_string(),
            max_redirects: 3,
        }
    }
}

/// Request context for one delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Unique identifier for this attempt, surfaced to the destination.
    pub delivery_id: Uuid,
    /// Destination URL.
    pub url: String,
    /// Exact serialized event, sent verbatim as the request body.
    pub body: Bytes,
    /// Attempt number for this destination (1-based).
    pub attempt_number: u32,
}

/// Outcome of a successful delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    /// HTTP status code (always the canonical success code).
    pub status_code: u16,
    /// Total duration of the request.
    pub duration: Duration,
}

/// HTTP client shared by every fanout.
///
/// Connection pooling lives inside `reqwest::Client`, so one instance
/// serves all destinations and all concurrent fanouts.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the underlying HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a delivery client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the underlying HTTP
    /// client cannot be built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Performs one delivery attempt.
    ///
    /// # Errors
    ///
    /// - `NetworkError` for connection failures
    /// - `Timeout` when the configured deadline elapses
    /// - `UnexpectedStatus` for any response other than `200 OK`
    pub async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse> {
        let start_time = std::time::Instant::now();

        let span = info_span!(
            "delivery_attempt",
            delivery_id = %request.delivery_id,
            url = %request.url,
            attempt = request.attempt_number
        );

        async move {
            let response = self
                .client
                .post(&request.url)
                .header("content-type", "application/json")
                .header("X-Sluice-Delivery-Id", request.delivery_id.to_string())
                .header("X-Sluice-Delivery-Attempt", request.attempt_number.to_string())
                .body(request.body.clone())
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    let duration = start_time.elapsed();
                    tracing::warn!(duration_ms = duration.as_millis(), "request failed: {e}");

                    if e.is_timeout() {
                        return Err(DeliveryError::timeout(self.config.timeout.as_secs()));
                    }
                    if e.is_connect() {
                        return Err(DeliveryError::network(format!("connection failed: {e}")));
                    }
                    return Err(DeliveryError::network(e.to_string()));
                },
            };

            let duration = start_time.elapsed();
            let status_code = response.status().as_u16();

            if response.status() == reqwest::StatusCode::OK {
                tracing::debug!(duration_ms = duration.as_millis(), "destination accepted event");
                Ok(DeliveryResponse { status_code, duration })
            } else {
                tracing::warn!(
                    status = status_code,
                    duration_ms = duration.as_millis(),
                    "destination rejected event"
                );
                Err(DeliveryError::unexpected_status(status_code))
            }
        }
        .instrument(span)
        .await
    }
}
