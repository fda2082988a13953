//! Redis implementation of the KV store with per-call in-process fallback.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

use super::kv::{KvStore, MemoryKvStore};

/// INCR and first-hit EXPIRE in one round trip, so a crash between the two
/// can never leave a counter without a TTL.
static INCREMENT_WITH_EXPIRY: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('EXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

const SCAN_BATCH: usize = 100;

/// Shared store backed by Redis.
///
/// Every call carries a timeout. A failed or timed-out call is logged and
/// served by the in-process store instead; the next call tries Redis again.
#[derive(Clone)]
pub struct RedisKvStore {
    client: redis::Client,
    timeout: Duration,
    fallback: MemoryKvStore,
}

impl RedisKvStore {
    pub fn new(client: redis::Client, timeout: Duration, fallback: MemoryKvStore) -> Self {
        Self {
            client,
            timeout,
            fallback,
        }
    }

    /// Run a Redis operation under the call timeout. `None` means the caller
    /// should fall back.
    async fn attempt<T, F, Fut>(&self, op: &'static str, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(redis::aio::MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let call = async {
            let conn = self.client.get_multiplexed_async_connection().await?;
            f(conn).await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, key, error = %e, "redis call failed, using in-process store");
                None
            }
            Err(_) => {
                tracing::warn!(
                    op,
                    key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "redis call timed out, using in-process store"
                );
                None
            }
        }
    }
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 8);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn health_check(&self) -> Result<bool> {
        let mut conn = tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await??;

        let pong: String =
            tokio::time::timeout(self.timeout, redis::cmd("PING").query_async(&mut conn)).await??;
        Ok(pong == "PONG")
    }

    async fn increment_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64> {
        let count = self
            .attempt("incr", key, |mut conn| async move {
                let count: i64 = INCREMENT_WITH_EXPIRY
                    .key(key)
                    .arg(window_secs)
                    .invoke_async(&mut conn)
                    .await?;
                Ok(count)
            })
            .await;

        match count {
            Some(count) => Ok(count),
            None => self.fallback.increment_with_expiry(key, window_secs).await,
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let ttl = self
            .attempt("ttl", key, |mut conn| async move {
                let secs: i64 = conn.ttl(key).await?;
                Ok(secs)
            })
            .await;

        match ttl {
            // -2: no such key, -1: no expiry
            Some(secs) if secs >= 0 => Ok(Some(secs as u64)),
            Some(_) => Ok(None),
            None => self.fallback.ttl(key).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .attempt("get", key, |mut conn| async move {
                let value: Option<String> = conn.get(key).await?;
                Ok(value)
            })
            .await;

        match value {
            Some(value) => Ok(value),
            None => self.fallback.get(key).await,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let stored = self
            .attempt("set", key, |mut conn| async move {
                let _: () = conn.set_ex(key, value, ttl_secs).await?;
                Ok(())
            })
            .await;

        match stored {
            Some(()) => Ok(()),
            None => self.fallback.set_with_ttl(key, value, ttl_secs).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // Values written during an earlier fallback live only in-process.
        self.fallback.delete(key).await?;

        self.attempt("del", key, |mut conn| async move {
            let _: () = conn.del(key).await?;
            Ok(())
        })
        .await;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let local = self.fallback.delete_by_prefix(prefix).await?;
        let pattern = format!("{}*", escape_glob(prefix));

        let remote = self
            .attempt("scan_del", prefix, |mut conn| async move {
                let mut cursor: u64 = 0;
                let mut deleted: u64 = 0;
                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await?;

                    if !keys.is_empty() {
                        let removed: u64 = conn.del(&keys).await?;
                        deleted += removed;
                    }

                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(deleted)
            })
            .await;

        Ok(local + remote.unwrap_or(0))
    }
}
