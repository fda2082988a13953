//! HTTP handlers, one router per resource.
//!
//! - **health** - `GET /health`
//! - **reviews** - public listing and direct submission under `/reviews`
//! - **write** - token-link review page under `/reviews` (storefront proxy)
//! - **review_tokens**, **review_links**, **admin** - merchant endpoints under `/admin`

pub mod admin;
pub mod health;
pub mod review_links;
pub mod review_tokens;
pub mod reviews;
pub mod write;

use axum::Router;

use crate::state::AppState;

/// Every route of the service, without the outer HTTP layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/reviews", reviews::router().merge(write::router()))
        .nest(
            "/admin",
            review_tokens::router()
                .merge(review_links::router())
                .merge(admin::router()),
        )
}
