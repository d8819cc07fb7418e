//! Redis-backed queue store.
//!
//! The worker relies on two atomic list primitives: `LMOVE src dst RIGHT
//! LEFT` to claim the oldest pending event into the in-flight list, and
//! `LREM key 0 value` to remove every occurrence of a serialized event
//! during cleanup. Producers append with `LPUSH`, so the tail of the
//! pending list is always the oldest entry.
//!
//! Connections go through `ConnectionManager`, which reconnects
//! transparently. The handle is cheap to clone and is shared by the
//! dequeue loop and every concurrently running fanout.

use redis::{aio::ConnectionManager, AsyncCommands, Direction};

use crate::error::Result;

/// Redis client wrapper with automatic reconnection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to a Redis server.
    ///
    /// Supports both `redis://` and `rediss://` (TLS) URLs.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` if the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Verifies the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` if the server is unreachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Atomically pops the tail of `source` and pushes it to the head of
    /// `dest`. Returns `None` when `source` is empty.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` on any Redis failure.
    pub async fn move_tail(&self, source: &str, dest: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> =
            conn.lmove(source, dest, Direction::Right, Direction::Left).await?;
        Ok(value)
    }

    /// Removes every occurrence of `value` from the list at `key`.
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` on any Redis failure.
    pub async fn remove_all(&self, key: &str, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(key, 0, value).await?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }

    /// Pushes `value` to the head of the list at `key`.
    ///
    /// Used by producers to enqueue events and by the worker to route
    /// events to the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` on any Redis failure.
    pub async fn push(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(key, value).await?;
        Ok(())
    }

    /// Length of the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` on any Redis failure.
    pub async fn len(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.llen(key).await?;
        Ok(usize::try_from(len).unwrap_or(0))
    }
}
