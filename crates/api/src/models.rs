use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::api::{PublicReview, ReviewStatus, ReviewType};
use sqlx::FromRow;
use uuid::Uuid;

/// Normalize a customer email for use as an identity (keys, lookups, inserts).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub shop: String,
    pub product_id: Option<String>,
    pub product_title: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    /// Set only for reviews submitted through an order-bound token link.
    pub order_id: Option<String>,
    #[sqlx(rename = "type", try_from = "String")]
    pub review_type: ReviewType,
    pub rating: i32,
    pub title: String,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub status: ReviewStatus,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn to_public(&self) -> PublicReview {
        PublicReview {
            id: self.id,
            rating: self.rating,
            title: self.title.clone(),
            content: self.content.clone(),
            customer_name: self.customer_name.clone(),
            verified_purchase: self.order_id.is_some(),
            created_at: self.created_at,
            reply: self.reply.clone(),
        }
    }
}

/// Which reviews a listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewFilter {
    Product(String),
    Company,
    All,
}

impl ReviewFilter {
    /// Company listings ignore any product id; a listing without a product id
    /// shows every review type.
    pub fn from_params(review_type: Option<ReviewType>, product_id: Option<&str>) -> Self {
        let product_id = product_id.map(str::trim).filter(|id| !id.is_empty());
        match (review_type, product_id) {
            (Some(ReviewType::Company), _) => ReviewFilter::Company,
            (_, Some(id)) => ReviewFilter::Product(id.to_string()),
            (_, None) => ReviewFilter::All,
        }
    }
}

/// One page of approved reviews plus totals over the whole filter.
#[derive(Debug, Clone)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub total: i64,
    pub average_rating: Option<f64>,
}

/// A review ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub shop: String,
    pub product_id: Option<String>,
    pub product_title: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub order_id: Option<String>,
    pub review_type: ReviewType,
    pub rating: i32,
    pub title: String,
    pub content: String,
    pub status: ReviewStatus,
}

impl NewReview {
    pub fn submission_key(&self) -> SubmissionKey {
        SubmissionKey {
            shop: self.shop.clone(),
            customer_email: self.customer_email.clone(),
            product_id: self.product_id.clone(),
            review_type: self.review_type,
        }
    }
}

/// Outcome of an insert guarded by the uniqueness constraint.
#[derive(Debug, Clone)]
pub enum ReviewInsert {
    Created(Review),
    /// A review with the same submission key already exists.
    Duplicate,
}

/// Merchant moderation change. `reply: Some(None)` clears the reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewModeration {
    pub status: Option<ReviewStatus>,
    pub reply: Option<Option<String>>,
}

/// Identity of an accepted review. At most one review exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub shop: String,
    pub customer_email: String,
    pub product_id: Option<String>,
    pub review_type: ReviewType,
}

/// Single-use review request token bound to one customer and product.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReviewToken {
    pub token: String,
    pub shop: String,
    pub product_id: String,
    pub product_title: String,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl ReviewToken {
    /// Valid iff never used and not yet expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReviewToken {
    pub token: String,
    pub shop: String,
    pub product_id: String,
    pub product_title: String,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Per-shop moderation and reward policy.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShopSettings {
    pub shop: String,
    /// 0 disables auto-approval.
    pub auto_approve_min_rating: i32,
    pub review_discount_enabled: bool,
    pub review_discount_percentage: i32,
    pub require_verified_purchase: bool,
    #[serde(skip_serializing)]
    pub admin_key_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ShopSettings {
    /// Policy applied to shops that never saved settings.
    pub fn defaults(shop: &str) -> Self {
        Self {
            shop: shop.to_string(),
            auto_approve_min_rating: 0,
            review_discount_enabled: false,
            review_discount_percentage: 10,
            require_verified_purchase: false,
            admin_key_hash: None,
            updated_at: Utc::now(),
        }
    }

    /// Initial status of a new review with the given rating.
    pub fn status_for(&self, rating: i32) -> ReviewStatus {
        if self.auto_approve_min_rating > 0 && rating >= self.auto_approve_min_rating {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsUpdate {
    pub auto_approve_min_rating: i32,
    pub review_discount_enabled: bool,
    pub review_discount_percentage: i32,
    pub require_verified_purchase: bool,
}
