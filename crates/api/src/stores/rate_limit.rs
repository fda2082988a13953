//! Fixed-window rate limiting on top of the KV store.

use std::sync::Arc;

use async_trait::async_trait;

use super::kv::KvStore;

/// Allowed attempts per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Review submissions per (shop, customer).
    pub const REVIEW_SUBMISSION: Self = Self {
        max_attempts: 5,
        window_secs: 3600,
    };

    /// Token-link submission attempts per shop, counted before the token is
    /// looked up.
    pub const LINK_SUBMISSION_ATTEMPTS: Self = Self {
        max_attempts: 100,
        window_secs: 3600,
    };

    /// Review-link generation per shop.
    pub const TOKEN_GENERATION: Self = Self {
        max_attempts: 100,
        window_secs: 3600,
    };
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Under the limit, with attempts left in this window.
    Allowed { remaining: u32 },
    /// Over the limit until the window resets.
    Exceeded { retry_after_secs: u64 },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Rate limiter keyed by an arbitrary string.
///
/// Checking counts as an attempt. Infrastructure errors never deny a request:
/// the limiter fails open and logs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitResult;
}

/// Key for review submissions by one customer, whichever flow they use.
pub fn review_key(shop: &str, email: &str) -> String {
    format!("rl:review:{}:{}", shop, email)
}

/// Key for token-link submission attempts against a shop. One key per shop,
/// so unknown tokens cannot each open a fresh counter.
pub fn link_attempt_key(shop: &str) -> String {
    format!("rl:review-link:{}", shop)
}

/// Key for review-link generation.
pub fn token_generation_key(shop: &str) -> String {
    format!("rl:token-gen:{}", shop)
}

/// Rate limiter backed by any [`KvStore`].
#[derive(Clone)]
pub struct KvRateLimiter {
    kv: Arc<dyn KvStore>,
}

impl KvRateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl RateLimiter for KvRateLimiter {
    async fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitResult {
        let count = match self.kv.increment_with_expiry(key, policy.window_secs).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key, error = %e, "rate limit check failed, allowing request");
                return RateLimitResult::Allowed {
                    remaining: policy.max_attempts,
                };
            }
        };

        let max = i64::from(policy.max_attempts);
        if count <= max {
            return RateLimitResult::Allowed {
                remaining: (max - count) as u32,
            };
        }

        let retry_after_secs = match self.kv.ttl(key).await {
            Ok(Some(ttl)) if ttl > 0 => ttl,
            Ok(_) => policy.window_secs,
            Err(e) => {
                tracing::warn!(key, error = %e, "rate limit ttl lookup failed");
                policy.window_secs
            }
        };

        tracing::info!(key, count, retry_after_secs, "rate limit exceeded");
        RateLimitResult::Exceeded { retry_after_secs }
    }
}
