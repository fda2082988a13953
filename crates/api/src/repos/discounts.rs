//! Discount code issuance log for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscountRepo: Send + Sync {
    /// Record an issued code. Returns `false` if the code was already taken.
    async fn record(&self, shop: &str, code: &str, percentage: i32) -> Result<bool>;
}

/// PostgreSQL implementation of DiscountRepo.
#[derive(Clone)]
pub struct PgDiscountRepo {
    pool: Pool<Postgres>,
}

impl PgDiscountRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscountRepo for PgDiscountRepo {
    async fn record(&self, shop: &str, code: &str, percentage: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO discount_codes (shop, code, percentage)
            VALUES ($1, $2, $3)
            ON CONFLICT (shop, code) DO NOTHING
            "#,
        )
        .bind(shop)
        .bind(code)
        .bind(percentage)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
