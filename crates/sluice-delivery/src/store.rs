//! Queue store abstraction for the fanout engine.
//!
//! The engine needs exactly four operations from the backing store: the
//! atomic tail-to-head move that claims an event, the remove-all that
//! cleans up the in-flight list, a head push for the dead-letter sink, and
//! a ping for readiness checks. Production uses the Redis-backed
//! `sluice_core::store::RedisStore`; tests use the deterministic in-memory
//! implementation in [`mock`].

use std::{future::Future, pin::Pin, sync::Arc};

use sluice_core::error::Result;

/// Store operations required by the fanout engine.
pub trait QueueStore: Send + Sync + 'static {
    /// Atomically pops the tail of `source` and pushes it to the head of
    /// `dest`. `None` means the source list is empty.
    fn move_tail<'a>(
        &'a self,
        source: &'a str,
        dest: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

    /// Removes every occurrence of `value` from the list at `key`,
    /// returning how many entries were removed.
    fn remove_all<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;

    /// Pushes `value` to the head of the list at `key`.
    fn push<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Verifies the store is reachable.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production store backed by Redis.
pub struct RedisQueueStore {
    store: sluice_core::store::RedisStore,
}

impl RedisQueueStore {
    /// Wraps a connected Redis store.
    pub fn new(store: sluice_core::store::RedisStore) -> Self {
        Self { store }
    }
}

impl QueueStore for RedisQueueStore {
    fn move_tail<'a>(
        &'a self,
        source: &'a str,
        dest: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move { self.store.move_tail(source, dest).await })
    }

    fn remove_all<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move { self.store.remove_all(key, value).await })
    }

    fn push<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { self.store.push(key, value).await })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.store.ping().await })
    }
}

pub mod mock {
    //! In-memory queue store for testing.
    //!
    //! Keeps lists as `VecDeque`s with the same head/tail orientation as
    //! Redis (`push` is LPUSH, `move_tail` is LMOVE RIGHT LEFT). Supports
    //! one-shot error injection and records claim activity so tests can
    //! assert ordering and poll cadence.

    use std::collections::{HashMap, VecDeque};

    use sluice_core::error::CoreError;
    use tokio::sync::Mutex;

    use super::{Arc, Future, Pin, QueueStore, Result};

    /// Deterministic in-memory store.
    pub struct MockQueueStore {
        lists: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
        move_error: Arc<Mutex<Option<String>>>,
        remove_error: Arc<Mutex<Option<String>>>,
        ping_error: Arc<Mutex<Option<String>>>,
        move_attempts: Arc<Mutex<u64>>,
        moved_values: Arc<Mutex<Vec<String>>>,
    }

    impl MockQueueStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self {
                lists: Arc::new(Mutex::new(HashMap::new())),
                move_error: Arc::new(Mutex::new(None)),
                remove_error: Arc::new(Mutex::new(None)),
                ping_error: Arc::new(Mutex::new(None)),
                move_attempts: Arc::new(Mutex::new(0)),
                moved_values: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Pushes a value to the head of a list, as a producer would.
        pub async fn seed(&self, key: &str, value: &str) {
            self.lists
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .push_front(value.to_string());
        }

        /// Current contents of a list, head first.
        pub async fn items(&self, key: &str) -> Vec<String> {
            self.lists
                .lock()
                .await
                .get(key)
                .map(|list| list.iter().cloned().collect())
                .unwrap_or_default()
        }

        /// Injects an error for the next `move_tail` call.
        pub async fn inject_move_error(&self, error: impl Into<String>) {
            *self.move_error.lock().await = Some(error.into());
        }

        /// Injects an error for the next `remove_all` call.
        pub async fn inject_remove_error(&self, error: impl Into<String>) {
            *self.remove_error.lock().await = Some(error.into());
        }

        /// Injects an error for the next `ping` call.
        pub async fn inject_ping_error(&self, error: impl Into<String>) {
            *self.ping_error.lock().await = Some(error.into());
        }

        /// How many times `move_tail` has been called, empty polls included.
        pub async fn move_attempts(&self) -> u64 {
            *self.move_attempts.lock().await
        }

        /// Values claimed so far, in claim order.
        pub async fn moved_values(&self) -> Vec<String> {
            self.moved_values.lock().await.clone()
        }
    }

    impl Default for MockQueueStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl QueueStore for MockQueueStore {
        fn move_tail<'a>(
            &'a self,
            source: &'a str,
            dest: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
            Box::pin(async move {
                *self.move_attempts.lock().await += 1;

                if let Some(error) = self.move_error.lock().await.take() {
                    return Err(CoreError::Store(error));
                }

                let mut lists = self.lists.lock().await;
                let value = lists.get_mut(source).and_then(VecDeque::pop_back);
                if let Some(value) = value {
                    lists.entry(dest.to_string()).or_default().push_front(value.clone());
                    drop(lists);
                    self.moved_values.lock().await.push(value.clone());
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            })
        }

        fn remove_all<'a>(
            &'a self,
            key: &'a str,
            value: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
            Box::pin(async move {
                if let Some(error) = self.remove_error.lock().await.take() {
                    return Err(CoreError::Store(error));
                }

                let mut lists = self.lists.lock().await;
                let Some(list) = lists.get_mut(key) else {
                    return Ok(0);
                };
                let before = list.len();
                list.retain(|item| item != value);
                Ok(before - list.len())
            })
        }

        fn push<'a>(
            &'a self,
            key: &'a str,
            value: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.seed(key, value).await;
                Ok(())
            })
        }

        fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                if let Some(error) = self.ping_error.lock().await.take() {
                    return Err(CoreError::Store(error));
                }
                Ok(())
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn move_tail_claims_oldest_first() {
            let store = MockQueueStore::new();
            store.seed("pending", "first").await;
            store.seed("pending", "second").await;

            let claimed = store.move_tail("pending", "in_flight").await.unwrap();
            assert_eq!(claimed.as_deref(), Some("first"));
            assert_eq!(store.items("in_flight").await, vec!["first".to_string()]);
            assert_eq!(store.items("pending").await, vec!["second".to_string()]);
        }

        #[tokio::test]
        async fn move_tail_on_empty_list_returns_none() {
            let store = MockQueueStore::new();
            assert_eq!(store.move_tail("pending", "in_flight").await.unwrap(), None);
            assert_eq!(store.move_attempts().await, 1);
        }

        #[tokio::test]
        async fn remove_all_removes_every_occurrence() {
            let store = MockQueueStore::new();
            store.seed("in_flight", "dup").await;
            store.seed("in_flight", "other").await;
            store.seed("in_flight", "dup").await;

            let removed = store.remove_all("in_flight", "dup").await.unwrap();
            assert_eq!(removed, 2);
            assert_eq!(store.items("in_flight").await, vec!["other".to_string()]);
        }

        #[tokio::test]
        async fn injected_errors_fire_once() {
            let store = MockQueueStore::new();
            store.inject_move_error("simulated outage").await;

            assert!(store.move_tail("pending", "in_flight").await.is_err());
            assert!(store.move_tail("pending", "in_flight").await.is_ok());
        }
    }
}
