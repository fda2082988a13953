//! Review link generation for merchants.
//!
//! Endpoints:
//! - POST /admin/review-tokens - Mint (or reuse) a review link for one customer and product

use axum::{
    Json, Router, debug_handler,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{GenerateTokenPayload, GenerateTokenResponse};

use crate::{
    error::AppError,
    middleware::AdminShop,
    state::AppState,
    stores::{RateLimitResult, token_generation_key},
    tokens::{TokenRequest, build_rating_urls, build_review_url},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/review-tokens", post(generate_token))
}

/// Check the per-shop generation limit.
pub(crate) async fn check_generation_limit(state: &AppState, shop: &str) -> Result<(), AppError> {
    match state
        .stores
        .rate_limiter
        .check(&token_generation_key(shop), state.config.token_policy())
        .await
    {
        RateLimitResult::Allowed { .. } => Ok(()),
        RateLimitResult::Exceeded { retry_after_secs } => {
            tracing::warn!(shop = %shop, "review link generation rate limited");
            Err(AppError::RateLimited {
                message: format!(
                    "Too many review links generated. Please try again in {} seconds.",
                    retry_after_secs
                ),
                retry_after_secs,
            })
        }
    }
}

#[debug_handler]
async fn generate_token(
    admin: AdminShop,
    State(state): State<AppState>,
    payload: Result<Json<GenerateTokenPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    check_generation_limit(&state, &admin.shop).await?;

    let request = TokenRequest {
        shop: admin.shop.clone(),
        product_id: payload.product_id,
        product_title: payload.product_title,
        customer_id: payload.customer_id,
        customer_email: payload.customer_email,
        customer_name: payload.customer_name,
        order_id: payload.order_id,
    };
    let token = state.tokens().generate(request, Utc::now()).await?;

    tracing::info!(shop = %admin.shop, "review link generated");

    Ok(Json(GenerateTokenResponse {
        review_url: build_review_url(&admin.shop, &token.token, None)?,
        review_urls: build_rating_urls(&admin.shop, &token.token)?,
        token: token.token,
    }))
}
