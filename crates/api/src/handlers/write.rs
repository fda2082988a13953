//! Token-link review page, served through the storefront proxy.
//!
//! Endpoints:
//! - GET /reviews/write?token=..&rating=.. - Pre-fill data for the review form
//! - POST /reviews/write?token=.. - Submit the form
//!
//! Every invalid link (unknown, used, expired, other shop) gets the same
//! message so links cannot be probed.

use axum::{
    Form, Json, Router, debug_handler,
    extract::{Query, State, rejection::FormRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use shared::api::{
    ReviewFormResponse, ReviewType, SubmitReviewResponse, SubmittedReview, TokenQuery,
    TokenReviewForm,
};

use crate::{
    error::AppError,
    guard::{Submission, SubmissionError, TOKEN_INVALID_MESSAGE, submit_review},
    middleware::ProxyShop,
    models::SubmissionKey,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/write", get(review_form).post(submit_form))
}

fn invalid_link() -> AppError {
    AppError::Validation(TOKEN_INVALID_MESSAGE.to_string())
}

/// Star pre-selection from a one-click link. Anything unparseable is 0.
fn preselected_rating(rating: Option<&str>) -> u8 {
    rating
        .and_then(|r| r.trim().parse::<u8>().ok())
        .map(|r| r.min(5))
        .unwrap_or(0)
}

#[debug_handler]
async fn review_form(
    proxy: ProxyShop,
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    let token = query.token.as_deref().ok_or_else(invalid_link)?;

    let record = state
        .tokens()
        .validate(token, Utc::now())
        .await?
        .filter(|record| record.shop == proxy.shop)
        .ok_or_else(invalid_link)?;

    let key = SubmissionKey {
        shop: record.shop.clone(),
        customer_email: record.customer_email.clone(),
        product_id: Some(record.product_id.clone()),
        review_type: ReviewType::Product,
    };
    if state.repos.reviews.find_existing(&key).await?.is_some() {
        return Err(SubmissionError::DuplicateSubmission(ReviewType::Product).into_app_error());
    }

    Ok(Json(ReviewFormResponse {
        product_title: record.product_title,
        customer_name: record.customer_name,
        rating: preselected_rating(query.rating.as_deref()),
        verified_purchase: record.order_id.is_some(),
    }))
}

#[debug_handler]
async fn submit_form(
    proxy: ProxyShop,
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    form: Result<Form<TokenReviewForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(form) = form.map_err(|e| AppError::Validation(e.body_text()))?;

    let token = query
        .token
        .or_else(|| form.token.clone())
        .filter(|t| !t.is_empty())
        .ok_or_else(invalid_link)?;

    let submission = Submission::Token {
        shop: proxy.shop,
        token,
        review: form.review_content(),
    };
    let accepted = submit_review(&state, submission, Utc::now())
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
