//! Review submission guard.
//!
//! Runs every review write through the same ordered checks:
//!
//! 1. rate limit per shop and customer; link submissions are first limited
//!    per shop, then charged to the customer the token is bound to
//! 2. token validation; the token's bound identity replaces client input
//! 3. field validation and the shop's verified-purchase policy
//! 4. duplicate check against the durable store
//! 5. insert, with status from the shop's auto-approve threshold
//! 6. mark the token used
//! 7. invalidate the shop's cached listings
//! 8. enqueue a reward for approved reviews when rewards are enabled
//!
//! Steps 1-4 reject with a reason. Once step 5 commits, later failures are
//! logged and never undo the review. The unique index on reviews is the real
//! duplicate guard; the step 4 lookup only gives a clean early rejection.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use garde::Validate;
use shared::api::{ReviewContent, ReviewStatus, ReviewType, SubmitReviewPayload};

use crate::error::AppError;
use crate::models::{NewReview, Review, ReviewInsert, ReviewToken, ShopSettings, normalize_email};
use crate::rewards::RewardJob;
use crate::state::AppState;
use crate::stores::{RateLimitPolicy, RateLimitResult, link_attempt_key, review_key, shop_prefix};

pub const TOKEN_INVALID_MESSAGE: &str = "This review link has expired or already been used.";
const VERIFIED_PURCHASE_MESSAGE: &str = "This store only accepts reviews from verified purchases.";

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Too many reviews submitted. Please try again in {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{}", duplicate_message(.0))]
    DuplicateSubmission(ReviewType),

    /// Deliberately one message for unknown, used and expired tokens.
    #[error("{}", TOKEN_INVALID_MESSAGE)]
    TokenInvalidOrExpired,

    #[error("{}", VERIFIED_PURCHASE_MESSAGE)]
    VerifiedPurchaseRequired,

    #[error(transparent)]
    StoreUnavailable(#[from] anyhow::Error),
}

fn duplicate_message(review_type: &ReviewType) -> &'static str {
    match review_type {
        ReviewType::Product => "You have already reviewed this product.",
        ReviewType::Company => "You have already reviewed this store.",
    }
}

impl SubmissionError {
    pub fn into_app_error(self) -> AppError {
        let message = self.to_string();
        match self {
            SubmissionError::RateLimited { retry_after_secs } => AppError::RateLimited {
                message,
                retry_after_secs,
            },
            SubmissionError::ValidationFailed(_)
            | SubmissionError::DuplicateSubmission(_)
            | SubmissionError::TokenInvalidOrExpired => AppError::Validation(message),
            SubmissionError::VerifiedPurchaseRequired => {
                AppError::External(StatusCode::FORBIDDEN, VERIFIED_PURCHASE_MESSAGE)
            }
            SubmissionError::StoreUnavailable(e) => AppError::Internal(e),
        }
    }
}

/// A review write request.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Storefront widget submission. Identity is client-supplied.
    Direct(SubmitReviewPayload),
    /// Submission through an emailed review link.
    Token {
        shop: String,
        token: String,
        review: ReviewContent,
    },
}

/// An accepted review and the message to show the customer.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub review: Review,
    pub message: String,
}

/// Everything about a review except its moderation status.
struct Draft {
    shop: String,
    product_id: Option<String>,
    product_title: Option<String>,
    customer_id: Option<String>,
    customer_email: String,
    customer_name: String,
    order_id: Option<String>,
    review_type: ReviewType,
    content: ReviewContent,
}

impl Draft {
    fn from_payload(payload: SubmitReviewPayload) -> Result<Self, SubmissionError> {
        payload
            .validate()
            .map_err(|e| SubmissionError::ValidationFailed(e.to_string()))?;

        let product_id = payload
            .product_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let product_id = match payload.review_type {
            ReviewType::Product if product_id.is_none() => {
                return Err(SubmissionError::ValidationFailed(
                    "productId is required for product reviews".to_string(),
                ));
            }
            ReviewType::Product => product_id,
            ReviewType::Company => None,
        };

        Ok(Self {
            shop: payload.shop,
            product_id,
            product_title: payload.product_title,
            customer_id: payload.customer_id,
            customer_email: normalize_email(&payload.customer_email),
            customer_name: payload.customer_name.trim().to_string(),
            // Only token links can vouch for a purchase.
            order_id: None,
            review_type: payload.review_type,
            content: payload.review,
        })
    }

    fn from_token(record: ReviewToken, content: ReviewContent) -> Result<Self, SubmissionError> {
        content
            .validate()
            .map_err(|e| SubmissionError::ValidationFailed(e.to_string()))?;

        Ok(Self {
            shop: record.shop,
            product_id: Some(record.product_id),
            product_title: Some(record.product_title),
            customer_id: record.customer_id,
            customer_email: record.customer_email,
            customer_name: record.customer_name,
            order_id: record.order_id,
            review_type: ReviewType::Product,
            content,
        })
    }

    fn into_review(self, status: ReviewStatus) -> NewReview {
        NewReview {
            shop: self.shop,
            product_id: self.product_id,
            product_title: self.product_title,
            customer_id: self.customer_id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            order_id: self.order_id,
            review_type: self.review_type,
            rating: self.content.rating,
            title: self.content.title,
            content: self.content.content,
            status,
        }
    }
}

fn accepted_message(review: &Review) -> String {
    let mut message = if review.order_id.is_some() {
        "Thank you! Your verified purchase review has been submitted".to_string()
    } else {
        "Thank you! Your review has been submitted".to_string()
    };
    message.push_str(match review.status {
        ReviewStatus::Approved => " and is now live!",
        _ => " and is pending approval.",
    });
    message
}

async fn check_rate(
    state: &AppState,
    key: &str,
    policy: RateLimitPolicy,
) -> Result<(), SubmissionError> {
    match state.stores.rate_limiter.check(key, policy).await {
        RateLimitResult::Allowed { .. } => Ok(()),
        RateLimitResult::Exceeded { retry_after_secs } => {
            Err(SubmissionError::RateLimited { retry_after_secs })
        }
    }
}

/// Decide whether a submission may proceed and, if so, store it.
pub async fn submit_review(
    state: &AppState,
    submission: Submission,
    now: DateTime<Utc>,
) -> Result<Accepted, SubmissionError> {
    let (draft, token) = match submission {
        Submission::Direct(payload) => {
            let key = review_key(&payload.shop, &normalize_email(&payload.customer_email));
            check_rate(state, &key, state.config.review_policy()).await?;
            (Draft::from_payload(payload)?, None)
        }
        Submission::Token {
            shop,
            token,
            review,
        } => {
            check_rate(state, &link_attempt_key(&shop), state.config.link_attempt_policy())
                .await?;
            let record = state
                .tokens()
                .validate(&token, now)
                .await?
                // A link minted for one shop is not valid through another.
                .filter(|record| record.shop == shop)
                .ok_or(SubmissionError::TokenInvalidOrExpired)?;
            let key = review_key(&shop, &normalize_email(&record.customer_email));
            check_rate(state, &key, state.config.review_policy()).await?;
            (Draft::from_token(record, review)?, Some(token))
        }
    };

    let settings = state
        .repos
        .shops
        .get_settings(&draft.shop)
        .await?
        .unwrap_or_else(|| ShopSettings::defaults(&draft.shop));

    if settings.require_verified_purchase && draft.order_id.is_none() {
        return Err(SubmissionError::VerifiedPurchaseRequired);
    }

    let status = settings.status_for(draft.content.rating);
    let new_review = draft.into_review(status);

    let key = new_review.submission_key();
    if state.repos.reviews.find_existing(&key).await?.is_some() {
        return Err(SubmissionError::DuplicateSubmission(key.review_type));
    }

    let review = match state.repos.reviews.create(&new_review).await? {
        ReviewInsert::Created(review) => review,
        ReviewInsert::Duplicate => {
            return Err(SubmissionError::DuplicateSubmission(key.review_type));
        }
    };

    tracing::info!(
        shop = %review.shop,
        review_id = %review.id,
        status = %review.status,
        via_token = token.is_some(),
        "review accepted"
    );

    // Committed. Nothing below may fail the request.
    if let Some(token) = &token {
        match state.tokens().mark_used(token, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(review_id = %review.id, "review token was already marked used");
            }
            Err(e) => {
                tracing::error!(
                    review_id = %review.id,
                    error = %e,
                    "failed to mark review token used"
                );
            }
        }
    }

    state
        .stores
        .cache
        .delete_by_prefix(&shop_prefix(&review.shop))
        .await;

    if review.status == ReviewStatus::Approved && settings.review_discount_enabled {
        state.rewards.enqueue(RewardJob {
            shop: review.shop.clone(),
            customer_email: review.customer_email.clone(),
            customer_name: review.customer_name.clone(),
            percentage: settings.review_discount_percentage,
        });
    }

    Ok(Accepted {
        message: accepted_message(&review),
        review,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::IntoResponse;
    use chrono::Duration;

    use super::*;
    use crate::config::Config;
    use crate::models::ReviewFilter;
    use crate::repos::MockReviewRepo;
    use crate::stores::{
        KvStore, MemoryKvStore, MockRateLimiter, MockResponseCache, review_list_key,
    };
    use crate::test_utils::{
        InMemoryDb, PRODUCT, SHOP, TestStateBuilder, mock_token, test_config, token_string,
    };

    fn content(rating: i32) -> ReviewContent {
        ReviewContent {
            rating,
            title: "Great".to_string(),
            content: "Loved it".to_string(),
        }
    }

    fn direct(email: &str, rating: i32) -> Submission {
        Submission::Direct(SubmitReviewPayload {
            shop: SHOP.to_string(),
            product_id: Some(PRODUCT.to_string()),
            product_title: Some("Mug".to_string()),
            customer_id: None,
            customer_email: email.to_string(),
            customer_name: "Ann".to_string(),
            order_id: Some("forged-order".to_string()),
            review_type: ReviewType::Product,
            review: content(rating),
        })
    }

    fn via_token(token: &str, rating: i32) -> Submission {
        Submission::Token {
            shop: SHOP.to_string(),
            token: token.to_string(),
            review: content(rating),
        }
    }

    fn auto_approve(db: &InMemoryDb, min_rating: i32, discount: bool) {
        db.put_settings(ShopSettings {
            auto_approve_min_rating: min_rating,
            review_discount_enabled: discount,
            ..ShopSettings::defaults(SHOP)
        });
    }

    #[tokio::test]
    async fn direct_submission_is_pending_under_manual_moderation() {
        let db = InMemoryDb::default();
        let state = TestStateBuilder::new().with_db(db.clone()).build();

        let accepted = submit_review(&state, direct("Ann@Example.com", 5), Utc::now())
            .await
            .unwrap();

        assert_eq!(accepted.review.status, ReviewStatus::Pending);
        assert_eq!(
            accepted.message,
            "Thank you! Your review has been submitted and is pending approval."
        );
        let stored = db.reviews();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].customer_email, "ann@example.com");
        // Client-sent order ids never grant verified status.
        assert_eq!(stored[0].order_id, None);
    }

    #[tokio::test]
    async fn sixth_submission_in_window_is_rate_limited() {
        let state = TestStateBuilder::new().build();
        let now = Utc::now();

        for i in 0..5 {
            // Different products so only the limiter can reject.
            let Submission::Direct(mut payload) = direct("ann@example.com", 5) else {
                unreachable!()
            };
            payload.product_id = Some(format!("gid://shopify/Product/{i}"));
            submit_review(&state, Submission::Direct(payload), now)
                .await
                .unwrap();
        }

        let err = submit_review(&state, direct("ann@example.com", 5), now)
            .await
            .unwrap_err();

        let SubmissionError::RateLimited { retry_after_secs } = err else {
            panic!("expected rate limit, got {err:?}");
        };
        assert!(retry_after_secs > 0 && retry_after_secs <= 3600);
    }

    #[tokio::test]
    async fn second_review_of_same_product_is_duplicate() {
        let db = InMemoryDb::default();
        let state = TestStateBuilder::new().with_db(db.clone()).build();
        let now = Utc::now();

        submit_review(&state, direct("ann@example.com", 5), now)
            .await
            .unwrap();
        let err = submit_review(&state, direct(" ANN@example.com", 4), now)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::DuplicateSubmission(ReviewType::Product)
        ));
        assert_eq!(err.to_string(), "You have already reviewed this product.");
        assert_eq!(db.reviews().len(), 1);
    }

    #[tokio::test]
    async fn insert_race_loser_is_duplicate() {
        let mut reviews = MockReviewRepo::new();
        reviews.expect_find_existing().returning(|_| Ok(None));
        reviews
            .expect_create()
            .returning(|_| Ok(ReviewInsert::Duplicate));
        let state = TestStateBuilder::new().with_review_repo(reviews).build();

        let err = submit_review(&state, direct("ann@example.com", 5), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::DuplicateSubmission(_)));
    }

    #[tokio::test]
    async fn company_review_needs_no_product_and_drops_one() {
        let db = InMemoryDb::default();
        let state = TestStateBuilder::new().with_db(db.clone()).build();
        let Submission::Direct(mut payload) = direct("ann@example.com", 5) else {
            unreachable!()
        };
        payload.review_type = ReviewType::Company;

        submit_review(&state, Submission::Direct(payload.clone()), Utc::now())
            .await
            .unwrap();
        assert_eq!(db.reviews()[0].product_id, None);

        payload.product_id = Some("gid://shopify/Product/9".to_string());
        let err = submit_review(&state, Submission::Direct(payload), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You have already reviewed this store.");
    }

    #[tokio::test]
    async fn product_review_without_product_id_is_invalid() {
        let state = TestStateBuilder::new().build();
        let Submission::Direct(mut payload) = direct("ann@example.com", 5) else {
            unreachable!()
        };
        payload.product_id = Some("   ".to_string());

        let err = submit_review(&state, Submission::Direct(payload), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_invalid() {
        let state = TestStateBuilder::new().build();

        let err = submit_review(&state, direct("ann@example.com", 6), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn token_submission_is_verified_and_consumes_token() {
        let db = InMemoryDb::default();
        auto_approve(&db, 4, false);
        let token = token_string("t1");
        db.put_token(mock_token(&token, "ann@example.com", Some("1001")));
        let state = TestStateBuilder::new().with_db(db.clone()).build();
        let now = Utc::now();

        let accepted = submit_review(&state, via_token(&token, 5), now)
            .await
            .unwrap();

        assert_eq!(accepted.review.status, ReviewStatus::Approved);
        assert_eq!(accepted.review.order_id.as_deref(), Some("1001"));
        assert_eq!(accepted.review.product_id.as_deref(), Some(PRODUCT));
        assert_eq!(
            accepted.message,
            "Thank you! Your verified purchase review has been submitted and is now live!"
        );
        assert!(db.tokens()[0].used_at.is_some());

        let err = submit_review(&state, via_token(&token, 5), now)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::TokenInvalidOrExpired));
        assert_eq!(err.to_string(), TOKEN_INVALID_MESSAGE);
    }

    #[tokio::test]
    async fn expired_and_unknown_tokens_share_one_rejection() {
        let db = InMemoryDb::default();
        let token = token_string("t1");
        db.put_token(mock_token(&token, "ann@example.com", None));
        let state = TestStateBuilder::new().with_db(db).build();
        let later = Utc::now() + Duration::days(31);

        let expired = submit_review(&state, via_token(&token, 5), later)
            .await
            .unwrap_err();
        let unknown = submit_review(&state, via_token(&token_string("nope"), 5), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(expired.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn token_from_another_shop_is_rejected() {
        let db = InMemoryDb::default();
        let token = token_string("t1");
        db.put_token(mock_token(&token, "ann@example.com", None));
        let state = TestStateBuilder::new().with_db(db.clone()).build();

        let submission = Submission::Token {
            shop: "other.myshopify.com".to_string(),
            token: token.clone(),
            review: content(5),
        };
        let err = submit_review(&state, submission, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::TokenInvalidOrExpired));
        assert!(db.tokens()[0].used_at.is_none());
    }

    #[tokio::test]
    async fn failed_token_submission_leaves_token_usable() {
        let db = InMemoryDb::default();
        let token = token_string("t1");
        db.put_token(mock_token(&token, "ann@example.com", None));
        let state = TestStateBuilder::new().with_db(db.clone()).build();

        let err = submit_review(&state, via_token(&token, 0), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::ValidationFailed(_)));
        assert!(db.tokens()[0].used_at.is_none());
        assert!(db.reviews().is_empty());
    }

    #[tokio::test]
    async fn verified_purchase_policy_rejects_direct_and_unbound_tokens() {
        let db = InMemoryDb::default();
        db.put_settings(ShopSettings {
            require_verified_purchase: true,
            ..ShopSettings::defaults(SHOP)
        });
        let unbound = token_string("unbound");
        let bound = token_string("bound");
        db.put_token(mock_token(&unbound, "bob@example.com", None));
        let mut with_order = mock_token(&bound, "ann@example.com", Some("1001"));
        with_order.product_id = "gid://shopify/Product/2".to_string();
        db.put_token(with_order);
        let state = TestStateBuilder::new().with_db(db.clone()).build();
        let now = Utc::now();

        let direct_err = submit_review(&state, direct("ann@example.com", 5), now)
            .await
            .unwrap_err();
        let unbound_err = submit_review(&state, via_token(&unbound, 5), now)
            .await
            .unwrap_err();

        assert!(matches!(direct_err, SubmissionError::VerifiedPurchaseRequired));
        assert!(matches!(unbound_err, SubmissionError::VerifiedPurchaseRequired));
        assert_eq!(
            direct_err.into_app_error().into_response().status(),
            StatusCode::FORBIDDEN
        );

        assert!(submit_review(&state, via_token(&bound, 5), now).await.is_ok());
    }

    #[tokio::test]
    async fn accepted_review_invalidates_cached_listings() {
        let kv = Arc::new(MemoryKvStore::new());
        let state = TestStateBuilder::new()
            .with_kv(kv.clone() as Arc<dyn KvStore>)
            .build();
        let key = review_list_key(SHOP, &ReviewFilter::All, 1, 20);
        kv.set_with_ttl(&key, "{}", 60).await.unwrap();

        submit_review(&state, direct("ann@example.com", 5), Utc::now())
            .await
            .unwrap();

        assert_eq!(kv.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_submission_leaves_cache_alone() {
        let mut limiter = MockRateLimiter::new();
        limiter.expect_check().returning(|_, _| RateLimitResult::Exceeded {
            retry_after_secs: 10,
        });
        let mut cache = MockResponseCache::new();
        cache.expect_delete_by_prefix().never();
        let state = TestStateBuilder::new()
            .with_rate_limiter(limiter)
            .with_cache(cache)
            .build();

        let err = submit_review(&state, direct("ann@example.com", 5), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Too many reviews submitted. Please try again in 10 seconds."
        );
    }

    #[tokio::test]
    async fn token_submission_shares_the_customers_budget() {
        let db = InMemoryDb::default();
        let token = token_string("t1");
        db.put_token(mock_token(&token, "ann@example.com", Some("1001")));
        let state = TestStateBuilder::new().with_db(db.clone()).build();
        let now = Utc::now();

        for i in 0..5 {
            let Submission::Direct(mut payload) = direct("Ann@Example.com", 5) else {
                unreachable!()
            };
            payload.product_id = Some(format!("gid://shopify/Product/{}", i + 10));
            submit_review(&state, Submission::Direct(payload), now)
                .await
                .unwrap();
        }

        let err = submit_review(&state, via_token(&token, 5), now)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::RateLimited { .. }));
        assert_eq!(
            err.into_app_error().into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert!(db.tokens()[0].used_at.is_none());
    }

    #[tokio::test]
    async fn token_flow_charges_shop_attempts_then_customer() {
        let db = InMemoryDb::default();
        let token = token_string("t1");
        db.put_token(mock_token(&token, "Ann@Example.com", None));
        let mut limiter = MockRateLimiter::new();
        let mut seq = mockall::Sequence::new();
        limiter
            .expect_check()
            .withf(|key, policy| {
                key == "rl:review-link:demo.myshopify.com"
                    && *policy == RateLimitPolicy::LINK_SUBMISSION_ATTEMPTS
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| RateLimitResult::Allowed { remaining: 99 });
        limiter
            .expect_check()
            .withf(|key, policy| {
                key == "rl:review:demo.myshopify.com:ann@example.com"
                    && *policy == RateLimitPolicy::REVIEW_SUBMISSION
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| RateLimitResult::Allowed { remaining: 4 });
        let state = TestStateBuilder::new()
            .with_db(db)
            .with_rate_limiter(limiter)
            .build();

        submit_review(&state, via_token(&token, 5), Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_tokens_are_throttled_per_shop() {
        let state = TestStateBuilder::new()
            .with_config(Config {
                link_attempt_rate_limit: 3,
                ..test_config()
            })
            .build();
        let now = Utc::now();

        for i in 0..3 {
            let guess = token_string(&format!("guess-{i}"));
            let err = submit_review(&state, via_token(&guess, 5), now)
                .await
                .unwrap_err();
            assert!(matches!(err, SubmissionError::TokenInvalidOrExpired));
        }

        let err = submit_review(&state, via_token(&token_string("guess-3"), 5), now)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn approved_review_enqueues_reward_when_enabled() {
        let db = InMemoryDb::default();
        auto_approve(&db, 4, true);
        let (state, mut rx) = TestStateBuilder::new().with_db(db).build_with_rewards();

        submit_review(&state, direct("Ann@Example.com", 5), Utc::now())
            .await
            .unwrap();

        let job = rx.try_recv().unwrap();
        assert_eq!(job.customer_email, "ann@example.com");
        assert_eq!(job.percentage, 10);
    }

    #[tokio::test]
    async fn pending_review_earns_no_reward() {
        let db = InMemoryDb::default();
        auto_approve(&db, 4, true);
        let (state, mut rx) = TestStateBuilder::new().with_db(db).build_with_rewards();

        submit_review(&state, direct("ann@example.com", 3), Utc::now())
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let mut reviews = MockReviewRepo::new();
        reviews
            .expect_find_existing()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let state = TestStateBuilder::new().with_review_repo(reviews).build();

        let err = submit_review(&state, direct("ann@example.com", 5), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::StoreUnavailable(_)));
        assert_eq!(
            err.into_app_error().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
