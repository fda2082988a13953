//! Review request token repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::models::{NewReviewToken, ReviewToken};

/// Repository for review request tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewTokenRepo: Send + Sync {
    /// Hard-delete tokens that expired before `cutoff`. Returns the count.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Find the unused, unexpired token for (shop, email, product).
    async fn find_active(
        &self,
        shop: &str,
        customer_email: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewToken>>;

    /// Insert a token unless an active one already exists for the same
    /// (shop, email, product), in which case that one is returned instead.
    async fn insert_unless_active(&self, token: &NewReviewToken) -> Result<ReviewToken>;

    /// Point lookup by token string.
    async fn find_by_token(&self, token: &str) -> Result<Option<ReviewToken>>;

    /// Set `used_at` if it is still unset. Returns whether this call set it.
    async fn mark_used(&self, token: &str, now: DateTime<Utc>) -> Result<bool>;
}

/// PostgreSQL implementation of ReviewTokenRepo.
#[derive(Clone)]
pub struct PgReviewTokenRepo {
    pool: Pool<Postgres>,
}

impl PgReviewTokenRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const SELECT_ACTIVE: &str = r#"
    SELECT * FROM review_tokens
    WHERE shop = $1
      AND customer_email = $2
      AND product_id = $3
      AND used_at IS NULL
      AND expires_at > $4
    ORDER BY created_at DESC
    LIMIT 1
"#;

#[async_trait]
impl ReviewTokenRepo for PgReviewTokenRepo {
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM review_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_active(
        &self,
        shop: &str,
        customer_email: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewToken>> {
        let token = sqlx::query_as::<_, ReviewToken>(SELECT_ACTIVE)
            .bind(shop)
            .bind(customer_email)
            .bind(product_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    async fn insert_unless_active(&self, token: &NewReviewToken) -> Result<ReviewToken> {
        let mut tx = self.pool.begin().await?;

        // Serializes generation for one (shop, email, product) until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!(
                "review-token:{}:{}:{}",
                token.shop, token.customer_email, token.product_id
            ))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, ReviewToken>(SELECT_ACTIVE)
            .bind(&token.shop)
            .bind(&token.customer_email)
            .bind(&token.product_id)
            .bind(token.created_at)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(existing) = existing {
            tx.commit().await?;
            return Ok(existing);
        }

        let created = sqlx::query_as::<_, ReviewToken>(
            r#"
            INSERT INTO review_tokens (
                token, shop, product_id, product_title, customer_id, customer_email,
                customer_name, order_id, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&token.token)
        .bind(&token.shop)
        .bind(&token.product_id)
        .bind(&token.product_title)
        .bind(token.customer_id.as_deref())
        .bind(&token.customer_email)
        .bind(&token.customer_name)
        .bind(token.order_id.as_deref())
        .bind(token.created_at)
        .bind(token.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ReviewToken>> {
        let token = sqlx::query_as::<_, ReviewToken>("SELECT * FROM review_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    async fn mark_used(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE review_tokens SET used_at = $2 WHERE token = $1 AND used_at IS NULL")
                .bind(token)
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
