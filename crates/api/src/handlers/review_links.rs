//! Order-fulfilled automation: mint a review link per product and email them.
//!
//! Endpoints:
//! - POST /admin/review-links - Links for every distinct product of an order
//!
//! Line items without a product (tips, custom items) and repeated products
//! are skipped. A product whose link cannot be minted is logged and left out;
//! a failed email is logged and the links are still returned.

use std::collections::HashSet;

use axum::{
    Json, Router, debug_handler,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{
    FlowCustomer, ProductReviewLink, ReviewLinksPayload, ReviewLinksResponse, ReviewLinksSummary,
};

use crate::{
    error::AppError,
    handlers::review_tokens::check_generation_limit,
    middleware::AdminShop,
    services::{EmailMessage, ProductLinks, shop_display_name},
    state::AppState,
    tokens::{TokenRequest, build_review_url},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/review-links", post(generate_links))
}

/// Full name, falling back to the email when the order has no name.
fn display_name(customer: &FlowCustomer) -> String {
    let name = [customer.first_name.as_deref(), customer.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        customer.email.clone()
    } else {
        name
    }
}

fn links_for(shop: &str, token: &str, product_title: &str) -> anyhow::Result<ProductLinks> {
    Ok(ProductLinks {
        product_title: product_title.to_string(),
        review_url: build_review_url(shop, token, None)?,
        five_star_url: build_review_url(shop, token, Some(5))?,
        four_star_url: build_review_url(shop, token, Some(4))?,
        three_star_url: build_review_url(shop, token, Some(3))?,
    })
}

#[debug_handler]
async fn generate_links(
    admin: AdminShop,
    State(state): State<AppState>,
    payload: Result<Json<ReviewLinksPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    check_generation_limit(&state, &admin.shop).await?;

    let customer_name = display_name(&payload.customer);
    let first_name = payload
        .customer
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| customer_name.clone());

    let tokens = state.tokens();
    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut email_links = Vec::new();
    let mut products = Vec::new();

    for item in &payload.line_items {
        let Some(product_id) = item.product_id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !seen.insert(product_id) {
            continue;
        }

        let request = TokenRequest {
            shop: admin.shop.clone(),
            product_id: product_id.to_string(),
            product_title: item.title.clone(),
            customer_id: payload.customer.id.clone(),
            customer_email: payload.customer.email.clone(),
            customer_name: customer_name.clone(),
            order_id: Some(payload.order_id.clone()),
        };

        let links = match tokens.generate(request, now).await {
            Ok(token) => links_for(&admin.shop, &token.token, &item.title),
            Err(e) => Err(e),
        };

        match links {
            Ok(links) => {
                products.push(ProductReviewLink {
                    product_title: links.product_title.clone(),
                    review_url: links.review_url.clone(),
                    five_star_url: links.five_star_url.clone(),
                    four_star_url: links.four_star_url.clone(),
                    three_star_url: links.three_star_url.clone(),
                    image_url: item.image_url.clone(),
                });
                email_links.push(links);
            }
            Err(e) => {
                tracing::error!(
                    shop = %admin.shop,
                    product_id = %product_id,
                    error = %e,
                    "failed to generate review link"
                );
            }
        }
    }

    if !email_links.is_empty() {
        let message = EmailMessage::ReviewRequest {
            customer_name: first_name.clone(),
            order_name: payload.order_name.clone().filter(|name| !name.is_empty()),
            shop_name: shop_display_name(&admin.shop).to_string(),
            products: email_links,
        };
        if let Err(e) = state.email.send(&payload.customer.email, &message).await {
            tracing::error!(shop = %admin.shop, error = %e, "review request email failed");
        }
    }

    tracing::info!(
        shop = %admin.shop,
        product_count = products.len(),
        "review links generated"
    );

    Ok(Json(ReviewLinksResponse {
        return_value: ReviewLinksSummary {
            customer_first_name: first_name,
            customer_email: payload.customer.email,
            order_name: payload.order_name.unwrap_or_default(),
            product_count: products.len(),
            products,
        },
    }))
}
