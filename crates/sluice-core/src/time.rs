//! Clock abstraction for testable timing.
//!
//! Backoff waits and the idle poll interval both sleep through an injected
//! clock, so retry schedules can be verified exactly without real delays.
//! Production code uses `RealClock`; tests use `TestClock`, whose sleeps
//! advance virtual time immediately.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Time source for the worker.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Current system time for timestamps.
    fn now_system(&self) -> SystemTime;

    /// Sleeps for the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by the system and the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic clock for tests.
///
/// `sleep` advances virtual time by the requested duration and yields once,
/// so a retry sequence that would take a minute of wall time completes
/// immediately while `elapsed()` still reports the full schedule.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Virtual nanoseconds elapsed since creation.
    elapsed_ns: Arc<AtomicU64>,
    /// Fixed system time origin, nanoseconds since the epoch.
    origin_ns: u64,
    base_instant: Instant,
}

impl TestClock {
    /// Creates a test clock anchored at the current time.
    pub fn new() -> Self {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            origin_ns: u64::try_from(since_epoch.as_nanos().min(u128::from(u64::MAX)))
                .unwrap_or(0),
            base_instant: Instant::now(),
        }
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.elapsed_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn now_system(&self) -> SystemTime {
        UNIX_EPOCH
            + Duration::from_nanos(self.origin_ns)
            + Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        // Yield so concurrently running tasks get scheduled between sleeps.
        Box::pin(tokio::task::yield_now())
    }
}
