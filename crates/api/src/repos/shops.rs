//! Shop settings repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::{SettingsUpdate, ShopSettings};

/// Repository for per-shop settings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShopRepo: Send + Sync {
    /// Stored settings, `None` if the shop never saved any.
    async fn get_settings(&self, shop: &str) -> Result<Option<ShopSettings>>;

    /// Resolve an admin API key (by its SHA-256 hex digest) to its shop.
    async fn find_by_admin_key_hash(&self, key_hash: &str) -> Result<Option<ShopSettings>>;

    /// Create or update a shop's settings.
    async fn upsert_settings(&self, shop: &str, update: &SettingsUpdate) -> Result<ShopSettings>;
}

/// PostgreSQL implementation of ShopRepo.
#[derive(Clone)]
pub struct PgShopRepo {
    pool: Pool<Postgres>,
}

impl PgShopRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopRepo for PgShopRepo {
    async fn get_settings(&self, shop: &str) -> Result<Option<ShopSettings>> {
        let settings =
            sqlx::query_as::<_, ShopSettings>("SELECT * FROM shop_settings WHERE shop = $1")
                .bind(shop)
                .fetch_optional(&self.pool)
                .await?;
        Ok(settings)
    }

    async fn find_by_admin_key_hash(&self, key_hash: &str) -> Result<Option<ShopSettings>> {
        let settings = sqlx::query_as::<_, ShopSettings>(
            "SELECT * FROM shop_settings WHERE admin_key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn upsert_settings(&self, shop: &str, update: &SettingsUpdate) -> Result<ShopSettings> {
        let settings = sqlx::query_as::<_, ShopSettings>(
            r#"
            INSERT INTO shop_settings (
                shop, auto_approve_min_rating, review_discount_enabled,
                review_discount_percentage, require_verified_purchase, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (shop) DO UPDATE SET
                auto_approve_min_rating = EXCLUDED.auto_approve_min_rating,
                review_discount_enabled = EXCLUDED.review_discount_enabled,
                review_discount_percentage = EXCLUDED.review_discount_percentage,
                require_verified_purchase = EXCLUDED.require_verified_purchase,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(shop)
        .bind(update.auto_approve_min_rating)
        .bind(update.review_discount_enabled)
        .bind(update.review_discount_percentage)
        .bind(update.require_verified_purchase)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }
}
