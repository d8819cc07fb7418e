//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints with queue store
//! connectivity checks for orchestration systems. The health payload also
//! carries the live delivery counters, which is the operator's first stop
//! when events appear stranded in the in-flight list.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sluice_core::Clock;
use sluice_delivery::{store::QueueStore, EngineStats};
use tracing::{debug, error, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when the health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Delivery counters from the fanout engine
    pub delivery: EngineStats,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Critical systems failing
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Queue store connectivity check
    pub store: ComponentHealth,
}

/// Health status for an individual component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Health service encapsulating the clock dependency.
pub struct HealthService {
    clock: Arc<dyn Clock>,
}

impl HealthService {
    /// Creates a new health service with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Performs the service health checks.
    pub async fn health_check(
        &self,
        store: &Arc<dyn QueueStore>,
        stats: EngineStats,
    ) -> HealthResponse {
        debug!("performing health check");

        let timestamp = DateTime::<Utc>::from(self.clock.now_system());
        let start_time = self.clock.now();

        let store_health = match store.ping().await {
            Ok(()) => ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms: 0 },
            Err(e) => {
                error!(error = %e, "queue store health check failed");
                ComponentHealth {
                    status: ComponentStatus::Down,
                    message: Some(format!("store connection failed: {e}")),
                    response_time_ms: 0,
                }
            },
        };
        let duration = start_time.elapsed();

        let overall_status = match store_health.status {
            ComponentStatus::Up => HealthStatus::Healthy,
            ComponentStatus::Down => HealthStatus::Unhealthy,
        };

        HealthResponse {
            status: overall_status,
            timestamp,
            checks: HealthChecks {
                store: ComponentHealth {
                    response_time_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    ..store_health
                },
            },
            delivery: stats,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint handler.
///
/// Called frequently by orchestration systems and load balancers, so it
/// performs only a store ping plus an in-memory stats snapshot.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let health_service = HealthService::new(app_state.clock.clone());
    let stats = app_state.stats.read().await.clone();
    let response = health_service.health_check(&app_state.store, stats).await;

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    debug!(
        status = ?response.status,
        store_status = ?response.checks.store.status,
        "health check completed"
    );

    (status_code, Json(response)).into_response()
}

/// Readiness check endpoint for orchestration probes.
///
/// The worker is ready when its queue store is reachable, so this shares
/// the health check implementation.
#[instrument(name = "readiness_check", skip(app_state))]
pub async fn readiness_check(State(app_state): State<AppState>) -> Response {
    health_check(State(app_state)).await
}

/// Liveness check endpoint for orchestration probes.
///
/// Minimal check that does not touch external dependencies, only whether
/// the HTTP server is responding.
#[instrument(name = "liveness_check", skip(app_state))]
pub async fn liveness_check(State(app_state): State<AppState>) -> Response {
    debug!("performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(app_state.clock.now_system()),
        "service": "sluice",
    });

    (StatusCode::OK, Json(response)).into_response()
}
