//! Shared test utilities for API handler tests.
//!
//! Provides an in-memory durable store, common fixtures and a flexible
//! `TestStateBuilder` for constructing `AppState` instances. Anything not
//! overridden with a mock is backed by `InMemoryDb` and a fresh
//! `MemoryKvStore`, so tests exercise the real guard and cache logic.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, InMemoryDb};
//!
//! let db = InMemoryDb::default();
//! db.put_settings(auto_approve_settings(SHOP, 4));
//!
//! let state = TestStateBuilder::new().with_db(db.clone()).build();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::{Digest, Sha256};
use shared::api::{ReviewStatus, ReviewType};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::{hash_admin_key, signing_message};
use crate::models::{
    NewReview, NewReviewToken, Review, ReviewFilter, ReviewInsert, ReviewModeration, ReviewPage,
    ReviewToken, SettingsUpdate, ShopSettings, SubmissionKey,
};
use crate::repos::{
    DiscountRepo, MockReviewRepo, MockReviewTokenRepo, MockShopRepo, MockStatusRepo, Repos,
    ReviewRepo, ReviewTokenRepo, ShopRepo, StatusRepo,
};
use crate::rewards::{RewardJob, RewardQueue};
use crate::services::{EmailSender, MockEmailSender};
use crate::state::AppState;
use crate::stores::{
    KvResponseCache, KvStore, MemoryKvStore, MockRateLimiter, MockResponseCache, RateLimiter,
    ResponseCache, Stores,
};
use crate::tokens::TOKEN_TTL_DAYS;

pub const SHOP: &str = "demo.myshopify.com";
pub const PRODUCT: &str = "gid://shopify/Product/1";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const PROXY_SECRET: &str = "proxy-secret";

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: None,
        redis_timeout_ms: 100,
        smtp_url: None,
        resend_api_key: None,
        email_from: "Reviews <reviews@localhost>".to_string(),
        app_api_secret: PROXY_SECRET.to_string(),
        dev_bypass_app_proxy: false,
        review_rate_limit: 5,
        review_rate_window_secs: 3600,
        link_attempt_rate_limit: 100,
        token_rate_limit: 100,
        token_rate_window_secs: 3600,
        cache_ttl_secs: 60,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// Settings with the test admin key registered for `shop`.
pub fn admin_settings(shop: &str) -> ShopSettings {
    ShopSettings {
        admin_key_hash: Some(hash_admin_key(ADMIN_KEY)),
        ..ShopSettings::defaults(shop)
    }
}

/// Creates a stored review.
pub fn mock_review(shop: &str, email: &str, status: ReviewStatus) -> Review {
    Review {
        id: Uuid::new_v4(),
        shop: shop.to_string(),
        product_id: Some(PRODUCT.to_string()),
        product_title: Some("Mug".to_string()),
        customer_id: None,
        customer_email: email.to_string(),
        customer_name: "Ann".to_string(),
        order_id: None,
        review_type: ReviewType::Product,
        rating: 5,
        title: "Great".to_string(),
        content: "Loved it".to_string(),
        status,
        reply: None,
        replied_at: None,
        created_at: Utc::now(),
    }
}

/// Creates a valid, unused token for (SHOP, email, PRODUCT).
pub fn mock_token(token: &str, email: &str, order_id: Option<&str>) -> ReviewToken {
    let now = Utc::now();
    ReviewToken {
        token: token.to_string(),
        shop: SHOP.to_string(),
        product_id: PRODUCT.to_string(),
        product_title: "Mug".to_string(),
        customer_id: None,
        customer_email: email.to_string(),
        customer_name: "Ann".to_string(),
        order_id: order_id.map(str::to_string),
        created_at: now,
        expires_at: now + Duration::days(TOKEN_TTL_DAYS),
        used_at: None,
    }
}

/// A well-formed token string (64 hex chars) derived from `seed`.
pub fn token_string(seed: &str) -> String {
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// Query string carrying a valid proxy signature over `params`.
pub fn signed_query(params: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.extend_pairs(params.iter().copied());
    let unsigned = query.finish();

    let mut mac = Hmac::<Sha256>::new_from_slice(PROXY_SECRET.as_bytes()).unwrap();
    mac.update(signing_message(&unsigned).as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    if unsigned.is_empty() {
        format!("signature={signature}")
    } else {
        format!("{unsigned}&signature={signature}")
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// In-memory durable store
// ============================================================================

#[derive(Default)]
struct Tables {
    reviews: Vec<Review>,
    tokens: Vec<ReviewToken>,
    settings: HashMap<String, ShopSettings>,
    discounts: Vec<(String, String, i32)>,
}

/// In-memory stand-in for PostgreSQL, enforcing the same uniqueness rules.
#[derive(Clone, Default)]
pub struct InMemoryDb {
    tables: Arc<Mutex<Tables>>,
}

fn key_of(review: &Review) -> SubmissionKey {
    SubmissionKey {
        shop: review.shop.clone(),
        customer_email: review.customer_email.clone(),
        product_id: review.product_id.clone(),
        review_type: review.review_type,
    }
}

fn same_key(a: &SubmissionKey, b: &SubmissionKey) -> bool {
    a.shop == b.shop
        && a.customer_email == b.customer_email
        && a.product_id.as_deref().unwrap_or_default() == b.product_id.as_deref().unwrap_or_default()
        && a.review_type == b.review_type
}

fn matches_filter(review: &Review, filter: &ReviewFilter) -> bool {
    match filter {
        ReviewFilter::Product(id) => {
            review.review_type == ReviewType::Product && review.product_id.as_deref() == Some(id)
        }
        ReviewFilter::Company => review.review_type == ReviewType::Company,
        ReviewFilter::All => true,
    }
}

impl InMemoryDb {
    pub fn reviews(&self) -> Vec<Review> {
        self.tables.lock().unwrap().reviews.clone()
    }

    pub fn tokens(&self) -> Vec<ReviewToken> {
        self.tables.lock().unwrap().tokens.clone()
    }

    pub fn discounts(&self) -> Vec<(String, String, i32)> {
        self.tables.lock().unwrap().discounts.clone()
    }

    pub fn put_review(&self, review: Review) {
        self.tables.lock().unwrap().reviews.push(review);
    }

    pub fn put_token(&self, token: ReviewToken) {
        self.tables.lock().unwrap().tokens.push(token);
    }

    pub fn put_settings(&self, settings: ShopSettings) {
        self.tables
            .lock()
            .unwrap()
            .settings
            .insert(settings.shop.clone(), settings);
    }
}

#[async_trait]
impl ReviewRepo for InMemoryDb {
    async fn find_existing(&self, key: &SubmissionKey) -> Result<Option<Review>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reviews
            .iter()
            .find(|r| same_key(&key_of(r), key))
            .cloned())
    }

    async fn create(&self, review: &NewReview) -> Result<ReviewInsert> {
        let mut tables = self.tables.lock().unwrap();
        let key = review.submission_key();
        if tables.reviews.iter().any(|r| same_key(&key_of(r), &key)) {
            return Ok(ReviewInsert::Duplicate);
        }

        let created = Review {
            id: Uuid::new_v4(),
            shop: review.shop.clone(),
            product_id: review.product_id.clone(),
            product_title: review.product_title.clone(),
            customer_id: review.customer_id.clone(),
            customer_email: review.customer_email.clone(),
            customer_name: review.customer_name.clone(),
            order_id: review.order_id.clone(),
            review_type: review.review_type,
            rating: review.rating,
            title: review.title.clone(),
            content: review.content.clone(),
            status: review.status,
            reply: None,
            replied_at: None,
            created_at: Utc::now(),
        };
        tables.reviews.push(created.clone());
        Ok(ReviewInsert::Created(created))
    }

    async fn list_approved(
        &self,
        shop: &str,
        filter: &ReviewFilter,
        limit: i64,
        offset: i64,
    ) -> Result<ReviewPage> {
        let tables = self.tables.lock().unwrap();
        let mut matching: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.shop == shop && r.status == ReviewStatus::Approved)
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let average_rating = (total > 0)
            .then(|| matching.iter().map(|r| f64::from(r.rating)).sum::<f64>() / total as f64);
        let reviews = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(ReviewPage {
            reviews,
            total,
            average_rating,
        })
    }

    async fn moderate(
        &self,
        shop: &str,
        id: Uuid,
        change: &ReviewModeration,
    ) -> Result<Option<Review>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(review) = tables
            .reviews
            .iter_mut()
            .find(|r| r.shop == shop && r.id == id)
        else {
            return Ok(None);
        };

        if let Some(status) = change.status {
            review.status = status;
        }
        if let Some(reply) = &change.reply {
            review.replied_at = reply.as_ref().map(|_| Utc::now());
            review.reply = reply.clone();
        }
        Ok(Some(review.clone()))
    }

    async fn delete(&self, shop: &str, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.reviews.len();
        tables.reviews.retain(|r| !(r.shop == shop && r.id == id));
        Ok(tables.reviews.len() < before)
    }
}

#[async_trait]
impl ReviewTokenRepo for InMemoryDb {
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.tokens.len();
        tables.tokens.retain(|t| t.expires_at >= cutoff);
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn find_active(
        &self,
        shop: &str,
        customer_email: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewToken>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tokens
            .iter()
            .find(|t| {
                t.shop == shop
                    && t.customer_email == customer_email
                    && t.product_id == product_id
                    && t.is_valid_at(now)
            })
            .cloned())
    }

    async fn insert_unless_active(&self, token: &NewReviewToken) -> Result<ReviewToken> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.tokens.iter().find(|t| {
            t.shop == token.shop
                && t.customer_email == token.customer_email
                && t.product_id == token.product_id
                && t.is_valid_at(token.created_at)
        }) {
            return Ok(existing.clone());
        }

        let record = ReviewToken {
            token: token.token.clone(),
            shop: token.shop.clone(),
            product_id: token.product_id.clone(),
            product_title: token.product_title.clone(),
            customer_id: token.customer_id.clone(),
            customer_email: token.customer_email.clone(),
            customer_name: token.customer_name.clone(),
            order_id: token.order_id.clone(),
            created_at: token.created_at,
            expires_at: token.expires_at,
            used_at: None,
        };
        tables.tokens.push(record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ReviewToken>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_used(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables
            .tokens
            .iter_mut()
            .find(|t| t.token == token && t.used_at.is_none())
        {
            Some(record) => {
                record.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ShopRepo for InMemoryDb {
    async fn get_settings(&self, shop: &str) -> Result<Option<ShopSettings>> {
        Ok(self.tables.lock().unwrap().settings.get(shop).cloned())
    }

    async fn find_by_admin_key_hash(&self, key_hash: &str) -> Result<Option<ShopSettings>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .settings
            .values()
            .find(|s| s.admin_key_hash.as_deref() == Some(key_hash))
            .cloned())
    }

    async fn upsert_settings(&self, shop: &str, update: &SettingsUpdate) -> Result<ShopSettings> {
        let mut tables = self.tables.lock().unwrap();
        let settings = tables
            .settings
            .entry(shop.to_string())
            .or_insert_with(|| ShopSettings::defaults(shop));
        settings.auto_approve_min_rating = update.auto_approve_min_rating;
        settings.review_discount_enabled = update.review_discount_enabled;
        settings.review_discount_percentage = update.review_discount_percentage;
        settings.require_verified_purchase = update.require_verified_purchase;
        settings.updated_at = Utc::now();
        Ok(settings.clone())
    }
}

#[async_trait]
impl DiscountRepo for InMemoryDb {
    async fn record(&self, shop: &str, code: &str, percentage: i32) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        if tables.discounts.iter().any(|(s, c, _)| s == shop && c == code) {
            return Ok(false);
        }
        tables
            .discounts
            .push((shop.to_string(), code.to_string(), percentage));
        Ok(true)
    }
}

#[async_trait]
impl StatusRepo for InMemoryDb {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// ============================================================================
// State builder
// ============================================================================

/// Builder for constructing test `AppState`.
///
/// Uses `InMemoryDb` and a fresh in-process KV store for anything not
/// explicitly replaced by a mock.
pub struct TestStateBuilder {
    config: Config,
    db: InMemoryDb,
    review_repo: Option<MockReviewRepo>,
    token_repo: Option<MockReviewTokenRepo>,
    shop_repo: Option<MockShopRepo>,
    status_repo: Option<MockStatusRepo>,
    kv: Option<Arc<dyn KvStore>>,
    rate_limiter: Option<MockRateLimiter>,
    cache: Option<MockResponseCache>,
    email_sender: Option<MockEmailSender>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            config: test_config(),
            db: InMemoryDb::default(),
            review_repo: None,
            token_repo: None,
            shop_repo: None,
            status_repo: None,
            kv: None,
            rate_limiter: None,
            cache: None,
            email_sender: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_db(mut self, db: InMemoryDb) -> Self {
        self.db = db;
        self
    }

    pub fn with_review_repo(mut self, repo: MockReviewRepo) -> Self {
        self.review_repo = Some(repo);
        self
    }

    pub fn with_token_repo(mut self, repo: MockReviewTokenRepo) -> Self {
        self.token_repo = Some(repo);
        self
    }

    pub fn with_shop_repo(mut self, repo: MockShopRepo) -> Self {
        self.shop_repo = Some(repo);
        self
    }

    pub fn with_status_repo(mut self, repo: MockStatusRepo) -> Self {
        self.status_repo = Some(repo);
        self
    }

    pub fn with_kv(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: MockRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_cache(mut self, cache: MockResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_email_sender(mut self, sender: MockEmailSender) -> Self {
        self.email_sender = Some(sender);
        self
    }

    /// Builds the `AppState`, dropping the reward queue's receiving end.
    pub fn build(self) -> AppState {
        self.build_with_rewards().0
    }

    /// Builds the `AppState` and returns the reward queue's receiving end.
    pub fn build_with_rewards(self) -> (AppState, mpsc::Receiver<RewardJob>) {
        let db = self.db;

        let reviews: Arc<dyn ReviewRepo> = match self.review_repo {
            Some(mock) => Arc::new(mock),
            None => Arc::new(db.clone()),
        };
        let tokens: Arc<dyn ReviewTokenRepo> = match self.token_repo {
            Some(mock) => Arc::new(mock),
            None => Arc::new(db.clone()),
        };
        let shops: Arc<dyn ShopRepo> = match self.shop_repo {
            Some(mock) => Arc::new(mock),
            None => Arc::new(db.clone()),
        };
        let status: Arc<dyn StatusRepo> = match self.status_repo {
            Some(mock) => Arc::new(mock),
            None => Arc::new(db.clone()),
        };
        let repos = Repos {
            reviews,
            tokens,
            shops,
            discounts: Arc::new(db),
            status,
        };

        let kv = self
            .kv
            .unwrap_or_else(|| Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>);
        let mut stores = Stores::new(kv.clone());
        if let Some(limiter) = self.rate_limiter {
            stores.rate_limiter = Arc::new(limiter) as Arc<dyn RateLimiter>;
        }
        stores.cache = match self.cache {
            Some(mock) => Arc::new(mock) as Arc<dyn ResponseCache>,
            None => Arc::new(KvResponseCache::new(kv)),
        };

        let email = Arc::new(self.email_sender.unwrap_or_else(MockEmailSender::new))
            as Arc<dyn EmailSender>;
        let (rewards, rx) = RewardQueue::channel(16);

        let state = AppState {
            config: Arc::new(self.config),
            repos,
            stores,
            email,
            rewards,
        };
        (state, rx)
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
