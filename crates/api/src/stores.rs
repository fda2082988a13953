//! Ephemeral stores (Redis, or in-process when Redis is not configured).
//!
//! Everything here is TTL-bound and safe to lose: rate limit counters and
//! cached listing responses. Durable state lives in [`crate::repos`].
//!
//! ## Stores
//!
//! - **kv** - The key-value adapter (`MemoryKvStore`, `RedisKvStore`)
//! - **rate_limit** - Fixed-window counters built on the adapter
//! - **cache** - Read-through response cache with prefix invalidation
//!
//! ## Key Patterns
//!
//! ```text
//! rl:review:{shop}:{email}                   → Submission counter per customer
//! rl:review-link:{shop}                      → Token-link submission attempts
//! rl:token-gen:{shop}                        → Review-link generation counter
//! reviews:{shop}:{filter}:p{page}:n{size}    → Cached listing JSON
//! ```

mod cache;
mod kv;
mod rate_limit;
mod redis_kv;

pub use cache::{KvResponseCache, ResponseCache, review_list_key, shop_prefix};
pub use kv::{KvStore, MemoryKvStore};
pub use rate_limit::{
    KvRateLimiter, RateLimitPolicy, RateLimitResult, RateLimiter, link_attempt_key, review_key,
    token_generation_key,
};
pub use redis_kv::RedisKvStore;

#[cfg(test)]
pub use cache::MockResponseCache;
#[cfg(test)]
pub use kv::MockKvStore;
#[cfg(test)]
pub use rate_limit::MockRateLimiter;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub kv: Arc<dyn KvStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub cache: Arc<dyn ResponseCache>,
}

impl Stores {
    /// Build the limiter and cache on one shared backend.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            rate_limiter: Arc::new(KvRateLimiter::new(kv.clone())),
            cache: Arc::new(KvResponseCache::new(kv.clone())),
            kv,
        }
    }
}
