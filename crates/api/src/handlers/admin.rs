//! Merchant settings and moderation.
//!
//! Endpoints:
//! - GET /admin/settings - Current moderation and reward policy
//! - PUT /admin/settings - Replace the policy
//! - PATCH /admin/reviews/{id} - Approve, reject, or reply to a review
//! - DELETE /admin/reviews/{id} - Delete a review
//!
//! Reviews are always looked up within the caller's shop, so another shop's
//! review id is indistinguishable from an unknown one.

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use garde::Validate;
use shared::api::{
    ModerateReviewPayload, ModeratedReview, ShopSettingsPayload, ShopSettingsResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::AdminShop,
    models::{ReviewModeration, SettingsUpdate, ShopSettings},
    state::AppState,
    stores::shop_prefix,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/reviews/{id}", patch(moderate_review).delete(delete_review))
}

fn settings_response(settings: ShopSettings) -> ShopSettingsResponse {
    ShopSettingsResponse {
        shop: settings.shop,
        auto_approve_min_rating: settings.auto_approve_min_rating,
        review_discount_enabled: settings.review_discount_enabled,
        review_discount_percentage: settings.review_discount_percentage,
        require_verified_purchase: settings.require_verified_purchase,
        updated_at: settings.updated_at,
    }
}

#[debug_handler]
async fn get_settings(
    admin: AdminShop,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state
        .repos
        .shops
        .get_settings(&admin.shop)
        .await?
        .unwrap_or_else(|| ShopSettings::defaults(&admin.shop));

    Ok(Json(settings_response(settings)))
}

#[debug_handler]
async fn update_settings(
    admin: AdminShop,
    State(state): State<AppState>,
    payload: Result<Json<ShopSettingsPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let update = SettingsUpdate {
        auto_approve_min_rating: payload.auto_approve_min_rating,
        review_discount_enabled: payload.review_discount_enabled,
        review_discount_percentage: payload.review_discount_percentage,
        require_verified_purchase: payload.require_verified_purchase,
    };
    let settings = state
        .repos
        .shops
        .upsert_settings(&admin.shop, &update)
        .await?;

    tracing::info!(shop = %admin.shop, "shop settings updated");

    Ok(Json(settings_response(settings)))
}

/// Translate the wire payload: an empty or blank reply clears it.
fn moderation_from(payload: ModerateReviewPayload) -> ReviewModeration {
    ReviewModeration {
        status: payload.status,
        reply: payload.reply.map(|reply| {
            let reply = reply.trim().to_string();
            (!reply.is_empty()).then_some(reply)
        }),
    }
}

#[debug_handler]
async fn moderate_review(
    admin: AdminShop,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ModerateReviewPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let change = moderation_from(payload);
    if change == ReviewModeration::default() {
        return Err(AppError::Validation(
            "Nothing to update: provide status or reply".to_string(),
        ));
    }

    let review = state
        .repos
        .reviews
        .moderate(&admin.shop, id, &change)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Review not found"))?;

    state
        .stores
        .cache
        .delete_by_prefix(&shop_prefix(&admin.shop))
        .await;

    tracing::info!(shop = %admin.shop, review_id = %id, status = %review.status, "review moderated");

    Ok(Json(ModeratedReview {
        id: review.id,
        status: review.status,
        reply: review.reply,
        replied_at: review.replied_at,
    }))
}

#[debug_handler]
async fn delete_review(
    admin: AdminShop,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.repos.reviews.delete(&admin.shop, id).await? {
        return Err(AppError::External(StatusCode::NOT_FOUND, "Review not found"));
    }

    state
        .stores
        .cache
        .delete_by_prefix(&shop_prefix(&admin.shop))
        .await;

    tracing::info!(shop = %admin.shop, review_id = %id, "review deleted");

    Ok(StatusCode::NO_CONTENT)
}
