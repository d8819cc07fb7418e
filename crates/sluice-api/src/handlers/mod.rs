//! Request handlers for the administrative router.

pub mod health;

pub use health::{health_check, liveness_check, readiness_check};
