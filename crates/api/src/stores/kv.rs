//! Key-value store abstraction and the in-process implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

/// Backend for counters and short-lived values.
///
/// Counters and values live in the same key space from the caller's point of
/// view: `delete` and `delete_by_prefix` remove both.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Health check - verify backend connectivity.
    async fn health_check(&self) -> Result<bool>;

    /// Atomically increment a counter. The call that creates the counter
    /// (count becomes 1) sets its expiry to `window_secs`; later calls never
    /// refresh it. Once the expiry passes the next call starts a new window.
    async fn increment_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64>;

    /// Remaining lifetime of a key in seconds, `None` if absent or unbounded.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;

    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl_secs`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Delete a single key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every live key starting with `prefix`. Returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// A fixed-window counter: `expires_at` is set by the first hit and never moved.
struct Counter {
    count: i64,
    expires_at: Instant,
}

/// In-process store used when no shared store is configured, and as the
/// per-call fallback of [`RedisKvStore`](super::RedisKvStore).
///
/// Counters follow the same fixed-window rule as the Redis script, so each key
/// holds one count and one expiry regardless of how often it is hit.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    counters: Arc<DashMap<String, Counter>>,
    values: Arc<DashMap<String, StoredValue>>,
}

fn remaining_secs(expires_at: Instant, now: Instant) -> u64 {
    expires_at
        .saturating_duration_since(now)
        .as_secs_f64()
        .ceil() as u64
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired values and counters. Reads already ignore expired
    /// entries; this only bounds memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;

        self.values.retain(|_, stored| {
            let live = stored.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });

        self.counters.retain(|_, counter| {
            let live = counter.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });

        purged
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn increment_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64> {
        let now = Instant::now();

        // The entry guard holds the shard lock, so concurrent callers on the
        // same key are serialized.
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now,
        });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + Duration::from_secs(window_secs);
        }
        counter.count += 1;

        Ok(counter.count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = Instant::now();

        if let Some(counter) = self.counters.get(key).filter(|c| c.expires_at > now) {
            return Ok(Some(remaining_secs(counter.expires_at, now)));
        }

        Ok(self
            .values
            .get(key)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| remaining_secs(stored.expires_at, now)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();

        let live = match self.values.get(key) {
            Some(stored) if stored.expires_at > now => return Ok(Some(stored.value.clone())),
            Some(_) => false,
            None => return Ok(None),
        };

        if !live {
            self.values.remove_if(key, |_, stored| stored.expires_at <= now);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.values.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let now = Instant::now();
        let mut deleted = 0;

        self.values.retain(|key, stored| {
            if key.starts_with(prefix) {
                if stored.expires_at > now {
                    deleted += 1;
                }
                false
            } else {
                true
            }
        });
        self.counters.retain(|key, _| {
            if key.starts_with(prefix) {
                deleted += 1;
                false
            } else {
                true
            }
        });

        Ok(deleted)
    }
}
