//! Review request tokens.
//!
//! A token authorizes one review from one customer for one product without a
//! login. Tokens are issued (unused, unexpired), then either used or expired;
//! both end states reject submissions. At most one valid token exists per
//! (shop, email, product): generation hands back the existing one.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use url::Url;

use crate::models::{NewReviewToken, ReviewToken, normalize_email};
use crate::repos::ReviewTokenRepo;

/// Days a token stays valid after issue.
pub const TOKEN_TTL_DAYS: i64 = 30;
/// Tokens expired this many days ago are deleted.
pub const TOKEN_RETENTION_DAYS: i64 = 60;

const TOKEN_BYTES: usize = 32;

/// Who and what a token is for.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub shop: String,
    pub product_id: String,
    pub product_title: String,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub order_id: Option<String>,
}

/// Issues, validates and consumes review tokens.
#[derive(Clone)]
pub struct ReviewTokenService {
    repo: Arc<dyn ReviewTokenRepo>,
}

/// 256 random bits, hex encoded (URL-safe).
fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check before touching the store.
fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

impl ReviewTokenService {
    pub fn new(repo: Arc<dyn ReviewTokenRepo>) -> Self {
        Self { repo }
    }

    /// Return the active token for this (shop, email, product), creating one
    /// if there is none.
    pub async fn generate(&self, request: TokenRequest, now: DateTime<Utc>) -> Result<ReviewToken> {
        let cutoff = now - Duration::days(TOKEN_RETENTION_DAYS);
        match self.repo.delete_expired_before(cutoff).await {
            Ok(0) => {}
            Ok(deleted) => tracing::debug!(deleted, "removed stale review tokens"),
            Err(e) => tracing::warn!(error = %e, "review token cleanup failed"),
        }

        let customer_email = normalize_email(&request.customer_email);

        if let Some(existing) = self
            .repo
            .find_active(&request.shop, &customer_email, &request.product_id, now)
            .await?
        {
            tracing::debug!(shop = %request.shop, "reusing active review token");
            return Ok(existing);
        }

        let token = NewReviewToken {
            token: new_token(),
            shop: request.shop,
            product_id: request.product_id,
            product_title: request.product_title,
            customer_id: request.customer_id,
            customer_email,
            customer_name: request.customer_name,
            order_id: request.order_id,
            created_at: now,
            expires_at: now + Duration::days(TOKEN_TTL_DAYS),
        };

        self.repo.insert_unless_active(&token).await
    }

    /// The token's record if it is valid now. Read-only.
    pub async fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Option<ReviewToken>> {
        if !is_well_formed(token) {
            return Ok(None);
        }

        let record = self.repo.find_by_token(token).await?;
        Ok(record.filter(|r| r.is_valid_at(now)))
    }

    /// Consume a token. Call only after the review it authorized is stored.
    pub async fn mark_used(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        self.repo.mark_used(token, now).await
    }
}

/// Storefront URL of the review form for `token`, optionally with a
/// pre-selected star rating (ignored unless 1-5).
pub fn build_review_url(shop: &str, token: &str, rating: Option<u8>) -> Result<String> {
    let mut url = Url::parse(&format!("https://{}/apps/reviews/write", shop))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", token);
        if let Some(rating) = rating.filter(|r| (1..=5).contains(r)) {
            query.append_pair("rating", &rating.to_string());
        }
    }
    Ok(url.into())
}

/// One-click links keyed by star rating, 1 through 5.
pub fn build_rating_urls(shop: &str, token: &str) -> Result<BTreeMap<u8, String>> {
    (1..=5)
        .map(|rating| Ok((rating, build_review_url(shop, token, Some(rating))?)))
        .collect()
}
