//! Shared API request/response types used by the review service and its clients.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Max review title length (characters).
pub const MAX_TITLE_CHARS: usize = 100;
/// Max review body length (characters).
pub const MAX_CONTENT_CHARS: usize = 1000;
/// Max reviews per listing page.
pub const MAX_PER_PAGE: u32 = 100;
/// Default reviews per listing page.
pub const DEFAULT_PER_PAGE: u32 = 20;

// ============================================================================
// Review enums
// ============================================================================

/// What a review is about: one product, or the shop as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    #[default]
    Product,
    Company,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::Product => "product",
            ReviewType::Company => "company",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(ReviewType::Product),
            "company" => Ok(ReviewType::Company),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReviewType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Moderation state of a review. Only `approved` reviews are shown publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReviewStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Returned when parsing a stored enum value fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

// ============================================================================
// Submission types
// ============================================================================

/// The customer-authored part of a review, common to both submission flows.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewContent {
    #[garde(range(min = 1, max = 5))]
    pub rating: i32,
    #[garde(length(chars, min = 1, max = MAX_TITLE_CHARS))]
    pub title: String,
    #[garde(length(chars, min = 1, max = MAX_CONTENT_CHARS))]
    pub content: String,
}

/// Direct review submission from the storefront widget.
///
/// Identity fields are client-supplied and unverified. Any `order_id` sent here
/// is ignored: only token links can grant verified-purchase status.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewPayload {
    #[garde(length(min = 1, max = 255))]
    pub shop: String,
    #[garde(skip)]
    #[serde(default)]
    pub product_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub product_title: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub customer_id: Option<String>,
    #[garde(email)]
    pub customer_email: String,
    #[garde(length(chars, min = 1, max = 100))]
    pub customer_name: String,
    #[garde(skip)]
    #[serde(default)]
    pub order_id: Option<String>,
    #[garde(skip)]
    #[serde(rename = "type")]
    pub review_type: ReviewType,
    #[garde(dive)]
    #[serde(flatten)]
    pub review: ReviewContent,
}

/// Form fields posted by the token-link review page.
///
/// Everything is optional at the decoding layer so missing or malformed
/// fields surface as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenReviewForm {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl TokenReviewForm {
    /// Collapse the raw form fields into review content. Unparseable ratings
    /// become 0 so they fail the 1-5 range check.
    pub fn review_content(&self) -> ReviewContent {
        ReviewContent {
            rating: self
                .rating
                .as_deref()
                .and_then(|r| r.trim().parse().ok())
                .unwrap_or(0),
            title: self.title.clone().unwrap_or_default(),
            content: self.content.clone().unwrap_or_default(),
        }
    }
}

/// Query string of the token-link page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
    /// Star pre-selection from a one-click email link. Display only.
    #[serde(default)]
    pub rating: Option<String>,
}

/// Summary of an accepted review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedReview {
    pub id: Uuid,
    pub status: ReviewStatus,
}

/// Returned after a review is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReviewResponse {
    pub success: bool,
    pub review: SubmittedReview,
    pub message: String,
}

/// Pre-fill data for the token-link review form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFormResponse {
    pub product_title: String,
    pub customer_name: String,
    /// Pre-selected star rating, 0 when none.
    pub rating: u8,
    pub verified_purchase: bool,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

// ============================================================================
// Listing types
// ============================================================================

/// Query parameters for the public review listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListParams {
    #[serde(default)]
    pub shop: Option<String>,
    #[serde(default, rename = "type")]
    pub review_type: Option<ReviewType>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// A review as shown on the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicReview {
    pub id: Uuid,
    pub rating: i32,
    pub title: String,
    pub content: String,
    pub customer_name: String,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// Aggregate figures for a review listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub count: i64,
    pub page: u32,
    pub per_page: u32,
    /// Mean rating rounded to one decimal place.
    pub average_rating: f64,
}

/// One page of approved reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<PublicReview>,
    pub summary: ReviewSummary,
}

// ============================================================================
// Review request token types
// ============================================================================

/// Request to mint a review link for one customer and product.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenPayload {
    #[garde(length(min = 1))]
    pub product_id: String,
    #[garde(length(min = 1))]
    pub product_title: String,
    #[garde(skip)]
    #[serde(default)]
    pub customer_id: Option<String>,
    #[garde(email)]
    pub customer_email: String,
    #[garde(length(min = 1))]
    pub customer_name: String,
    #[garde(skip)]
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Returned after minting (or reusing) a review link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenResponse {
    pub token: String,
    pub review_url: String,
    /// One-click links keyed by pre-selected star rating (1-5).
    pub review_urls: BTreeMap<u8, String>,
}

/// Customer block of an automation-flow order payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FlowCustomer {
    #[garde(skip)]
    #[serde(default)]
    pub id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub first_name: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub last_name: Option<String>,
    #[garde(email)]
    pub email: String,
}

/// Line item of an automation-flow order payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FlowLineItem {
    /// Absent for non-product lines such as tips.
    #[garde(skip)]
    #[serde(default)]
    pub product_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub title: String,
    #[garde(skip)]
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Order-fulfilled automation payload: mint one link per product and email them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLinksPayload {
    #[garde(length(min = 1))]
    pub order_id: String,
    #[garde(skip)]
    #[serde(default)]
    pub order_name: Option<String>,
    #[garde(dive)]
    pub customer: FlowCustomer,
    #[garde(length(max = 50), dive)]
    pub line_items: Vec<FlowLineItem>,
}

/// Links minted for one product of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReviewLink {
    pub product_title: String,
    pub review_url: String,
    pub five_star_url: String,
    pub four_star_url: String,
    pub three_star_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Result summary handed back to the automation platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLinksSummary {
    pub customer_first_name: String,
    pub customer_email: String,
    pub order_name: String,
    pub product_count: usize,
    pub products: Vec<ProductReviewLink>,
}

/// Automation-flow response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLinksResponse {
    pub return_value: ReviewLinksSummary,
}

// ============================================================================
// Merchant settings and moderation
// ============================================================================

/// Moderation and reward policy of a shop.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShopSettingsPayload {
    /// Auto-approve reviews at or above this rating. 0 means manual moderation.
    #[garde(range(min = 0, max = 5))]
    pub auto_approve_min_rating: i32,
    #[garde(skip)]
    pub review_discount_enabled: bool,
    #[garde(range(min = 1, max = 100))]
    pub review_discount_percentage: i32,
    /// Only accept reviews from token links bound to an order.
    #[garde(skip)]
    #[serde(default)]
    pub require_verified_purchase: bool,
}

/// Current shop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopSettingsResponse {
    pub shop: String,
    pub auto_approve_min_rating: i32,
    pub review_discount_enabled: bool,
    pub review_discount_percentage: i32,
    pub require_verified_purchase: bool,
    pub updated_at: DateTime<Utc>,
}

/// Moderation action on a single review.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModerateReviewPayload {
    #[garde(skip)]
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    /// Merchant reply. An empty string clears the reply.
    #[garde(length(chars, max = MAX_CONTENT_CHARS))]
    #[serde(default)]
    pub reply: Option<String>,
}

/// Review state after a moderation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratedReview {
    pub id: Uuid,
    pub status: ReviewStatus,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
}
