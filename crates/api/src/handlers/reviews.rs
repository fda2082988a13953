//! Public review endpoints used by the storefront widget.
//!
//! Endpoints:
//! - GET /reviews - Approved reviews for a shop, product or company, paginated
//! - POST /reviews - Submit a review directly (unverified identity)
//!
//! Listings are read through the response cache. Any accepted submission or
//! moderation action drops every cached page of the shop.

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use shared::api::{
    DEFAULT_PER_PAGE, MAX_PER_PAGE, ReviewListParams, ReviewListResponse, ReviewSummary,
    SubmitReviewPayload, SubmitReviewResponse, SubmittedReview,
};

use crate::{
    error::AppError,
    guard::{Submission, submit_review},
    models::ReviewFilter,
    state::AppState,
    stores::review_list_key,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_reviews).post(create_review))
}

fn json_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Mean rating to one decimal place; 0 for an empty listing.
fn round_average(average: Option<f64>) -> f64 {
    average.map(|avg| (avg * 10.0).round() / 10.0).unwrap_or(0.0)
}

#[debug_handler]
async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ReviewListParams>,
) -> Result<Response, AppError> {
    let shop = params
        .shop
        .as_deref()
        .map(str::trim)
        .filter(|shop| !shop.is_empty())
        .ok_or_else(|| AppError::Validation("shop is required".to_string()))?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let filter = ReviewFilter::from_params(params.review_type, params.product_id.as_deref());

    let key = review_list_key(shop, &filter, page, per_page);
    if let Some(cached) = state.stores.cache.get(&key).await {
        return Ok(json_response(cached));
    }

    let offset = i64::from(page - 1) * i64::from(per_page);
    let listing = state
        .repos
        .reviews
        .list_approved(shop, &filter, i64::from(per_page), offset)
        .await?;

    let response = ReviewListResponse {
        reviews: listing.reviews.iter().map(|r| r.to_public()).collect(),
        summary: ReviewSummary {
            count: listing.total,
            page,
            per_page,
            average_rating: round_average(listing.average_rating),
        },
    };
    let body = serde_json::to_string(&response)?;

    state
        .stores
        .cache
        .set(&key, &body, state.config.cache_ttl_secs)
        .await;

    Ok(json_response(body))
}

#[debug_handler]
async fn create_review(
    State(state): State<AppState>,
    payload: Result<Json<SubmitReviewPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let accepted = submit_review(&state, Submission::Direct(payload), Utc::now())
        .await
        .map_err(|e| e.into_app_error())?;

    let response = SubmitReviewResponse {
        success: true,
        review: SubmittedReview {
            id: accepted.review.id,
            status: accepted.review.status,
        },
        message: accepted.message,
    };

    Ok((StatusCode::CREATED, Json(response)))
}
