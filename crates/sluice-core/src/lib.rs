//! Core domain types for the webhook fanout worker.
//!
//! Provides the event wire type, the error taxonomy, the clock abstraction
//! used for deterministic timing in tests, and the Redis-backed queue store.
//! The delivery and API crates build on these foundations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod store;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{ClaimedEvent, Event};
pub use store::RedisStore;
pub use time::{Clock, RealClock, TestClock};
