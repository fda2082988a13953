//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for durable storage.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **reviews** - Review records; the unique index on the submission key is
//!   the final guard against duplicate reviews
//! - **review_tokens** - Single-use review request tokens
//! - **shops** - Per-shop moderation/reward settings and admin keys
//! - **discounts** - Issued reward codes
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let settings = state.repos.shops.get_settings(&shop).await?;
//!     let page = state.repos.reviews.list_approved(&shop, &filter, 20, 0).await?;
//! }
//! ```

mod discounts;
mod review_tokens;
mod reviews;
mod shops;
mod status;

pub use discounts::DiscountRepo;
pub use review_tokens::ReviewTokenRepo;
pub use reviews::ReviewRepo;
pub use shops::ShopRepo;
pub use status::StatusRepo;

#[cfg(test)]
pub use discounts::MockDiscountRepo;
#[cfg(test)]
pub use review_tokens::MockReviewTokenRepo;
#[cfg(test)]
pub use reviews::MockReviewRepo;
#[cfg(test)]
pub use shops::MockShopRepo;
#[cfg(test)]
pub use status::MockStatusRepo;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub reviews: Arc<dyn ReviewRepo>,
    pub tokens: Arc<dyn ReviewTokenRepo>,
    pub shops: Arc<dyn ShopRepo>,
    pub discounts: Arc<dyn DiscountRepo>,
    pub status: Arc<dyn StatusRepo>,
}

impl Repos {
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            reviews: Arc::new(reviews::PgReviewRepo::new(pool.clone())),
            tokens: Arc::new(review_tokens::PgReviewTokenRepo::new(pool.clone())),
            shops: Arc::new(shops::PgShopRepo::new(pool.clone())),
            discounts: Arc::new(discounts::PgDiscountRepo::new(pool.clone())),
            status: Arc::new(status::PgStatusRepo::new(pool)),
        }
    }
}
