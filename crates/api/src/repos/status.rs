//! Status repository for health checks.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

/// Repository for database health checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusRepo: Send + Sync {
    /// Verify connectivity and that migrations have created the schema.
    async fn health_check(&self) -> Result<bool>;
}

/// PostgreSQL implementation of StatusRepo.
#[derive(Clone)]
pub struct PgStatusRepo {
    pool: Pool<Postgres>,
}

impl PgStatusRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusRepo for PgStatusRepo {
    async fn health_check(&self) -> Result<bool> {
        let migrated: bool = sqlx::query_scalar(
            "SELECT to_regclass('public.reviews') IS NOT NULL AND to_regclass('public.review_tokens') IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(migrated)
    }
}
