//! Read-through response cache with per-shop prefix invalidation.
//!
//! The cache is an optimization only. Every failure is logged and treated as
//! a miss or a no-op, and nothing that decides uniqueness or authorization may
//! read from it.

use std::sync::Arc;

use async_trait::async_trait;

use super::kv::KvStore;
use crate::models::ReviewFilter;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Cached payload, `None` on miss or error.
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl_secs: u64);

    /// Drop every entry under `prefix`.
    async fn delete_by_prefix(&self, prefix: &str);
}

/// Response cache backed by any [`KvStore`].
#[derive(Clone)]
pub struct KvResponseCache {
    kv: Arc<dyn KvStore>,
}

impl KvResponseCache {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl ResponseCache for KvResponseCache {
    async fn get(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        if let Err(e) = self.kv.set_with_ttl(key, value, ttl_secs).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) {
        match self.kv.delete_by_prefix(prefix).await {
            Ok(deleted) => tracing::debug!(prefix, deleted, "cache invalidated"),
            Err(e) => tracing::warn!(prefix, error = %e, "cache invalidation failed"),
        }
    }
}

// ============================================================================
// Key construction
// ============================================================================

/// Escape the key separator so caller-supplied values cannot forge segments.
fn escape_segment(value: &str) -> String {
    value.replace('%', "%25").replace(':', "%3A")
}

/// Prefix covering every cached view of one shop's reviews.
pub fn shop_prefix(shop: &str) -> String {
    format!("reviews:{}:", escape_segment(shop))
}

fn filter_segment(filter: &ReviewFilter) -> String {
    match filter {
        ReviewFilter::Product(id) => format!("product={}", escape_segment(id)),
        ReviewFilter::Company => "company".to_string(),
        ReviewFilter::All => "all".to_string(),
    }
}

/// Cache key of one page of a review listing.
pub fn review_list_key(shop: &str, filter: &ReviewFilter, page: u32, per_page: u32) -> String {
    format!(
        "{}{}:p{}:n{}",
        shop_prefix(shop),
        filter_segment(filter),
        page,
        per_page
    )
}
