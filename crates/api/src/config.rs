use serde::{Deserialize, Serialize};

use crate::stores::RateLimitPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared KV store. When unset, an in-process store is used.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Per-call timeout for Redis before falling back to the in-process store.
    #[serde(default = "default_redis_timeout_ms")]
    pub redis_timeout_ms: u64,
    /// SMTP URL for development email (e.g., smtp://localhost:1025)
    #[serde(default)]
    pub smtp_url: Option<String>,
    /// Resend API key for production email
    #[serde(default)]
    pub resend_api_key: Option<String>,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    /// Secret used to verify storefront proxy request signatures.
    pub app_api_secret: String,
    /// Development only: trust the `shop` query param on unsigned proxy requests.
    #[serde(default)]
    pub dev_bypass_app_proxy: bool,
    #[serde(default = "default_review_rate_limit")]
    pub review_rate_limit: u32,
    #[serde(default = "default_window_secs")]
    pub review_rate_window_secs: u64,
    /// Token-link submission attempts per shop, within the review window.
    #[serde(default = "default_link_attempt_rate_limit")]
    pub link_attempt_rate_limit: u32,
    #[serde(default = "default_token_rate_limit")]
    pub token_rate_limit: u32,
    #[serde(default = "default_window_secs")]
    pub token_rate_window_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

fn default_email_from() -> String {
    "Reviews <reviews@localhost>".to_string()
}

fn default_review_rate_limit() -> u32 {
    RateLimitPolicy::REVIEW_SUBMISSION.max_attempts
}

fn default_link_attempt_rate_limit() -> u32 {
    RateLimitPolicy::LINK_SUBMISSION_ATTEMPTS.max_attempts
}

fn default_token_rate_limit() -> u32 {
    RateLimitPolicy::TOKEN_GENERATION.max_attempts
}

fn default_window_secs() -> u64 {
    3600
}

fn default_cache_ttl_secs() -> u64 {
    60
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Limit on review submissions per (shop, customer).
    pub fn review_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_attempts: self.review_rate_limit,
            window_secs: self.review_rate_window_secs,
        }
    }

    /// Limit on token-link submission attempts per shop.
    pub fn link_attempt_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_attempts: self.link_attempt_rate_limit,
            window_secs: self.review_rate_window_secs,
        }
    }

    /// Limit on review-link generation per shop.
    pub fn token_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_attempts: self.token_rate_limit,
            window_secs: self.token_rate_window_secs,
        }
    }
}
