//! Review repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{
    NewReview, Review, ReviewFilter, ReviewInsert, ReviewModeration, ReviewPage, SubmissionKey,
};

/// Repository for review records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewRepo: Send + Sync {
    /// Find the review already accepted for a submission key, if any.
    async fn find_existing(&self, key: &SubmissionKey) -> Result<Option<Review>>;

    /// Insert a review. Reports `Duplicate` instead of failing when the
    /// uniqueness constraint rejects the row.
    async fn create(&self, review: &NewReview) -> Result<ReviewInsert>;

    /// One page of approved reviews, newest first, with totals.
    async fn list_approved(
        &self,
        shop: &str,
        filter: &ReviewFilter,
        limit: i64,
        offset: i64,
    ) -> Result<ReviewPage>;

    /// Apply a moderation change. `None` if no such review in this shop.
    async fn moderate(
        &self,
        shop: &str,
        id: Uuid,
        change: &ReviewModeration,
    ) -> Result<Option<Review>>;

    /// Delete a review. Returns whether a row was removed.
    async fn delete(&self, shop: &str, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of ReviewRepo.
#[derive(Clone)]
pub struct PgReviewRepo {
    pool: Pool<Postgres>,
}

impl PgReviewRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn filter_columns(filter: &ReviewFilter) -> (Option<&'static str>, Option<&str>) {
    match filter {
        ReviewFilter::Product(id) => (Some("product"), Some(id.as_str())),
        ReviewFilter::Company => (Some("company"), None),
        ReviewFilter::All => (None, None),
    }
}

#[async_trait]
impl ReviewRepo for PgReviewRepo {
    async fn find_existing(&self, key: &SubmissionKey) -> Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE shop = $1
              AND customer_email = $2
              AND COALESCE(product_id, '') = COALESCE($3::text, '')
              AND type = $4
            LIMIT 1
            "#,
        )
        .bind(&key.shop)
        .bind(&key.customer_email)
        .bind(key.product_id.as_deref())
        .bind(key.review_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn create(&self, review: &NewReview) -> Result<ReviewInsert> {
        let created = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (
                shop, product_id, product_title, customer_id, customer_email,
                customer_name, order_id, type, rating, title, content, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&review.shop)
        .bind(review.product_id.as_deref())
        .bind(review.product_title.as_deref())
        .bind(review.customer_id.as_deref())
        .bind(&review.customer_email)
        .bind(&review.customer_name)
        .bind(review.order_id.as_deref())
        .bind(review.review_type.as_str())
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match created {
            Some(review) => ReviewInsert::Created(review),
            None => ReviewInsert::Duplicate,
        })
    }

    async fn list_approved(
        &self,
        shop: &str,
        filter: &ReviewFilter,
        limit: i64,
        offset: i64,
    ) -> Result<ReviewPage> {
        let (review_type, product_id) = filter_columns(filter);

        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE shop = $1
              AND status = 'approved'
              AND ($2::text IS NULL OR type = $2)
              AND ($3::text IS NULL OR product_id = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(shop)
        .bind(review_type)
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total, average_rating): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), AVG(rating)::float8 FROM reviews
            WHERE shop = $1
              AND status = 'approved'
              AND ($2::text IS NULL OR type = $2)
              AND ($3::text IS NULL OR product_id = $3)
            "#,
        )
        .bind(shop)
        .bind(review_type)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReviewPage {
            reviews,
            total,
            average_rating,
        })
    }

    async fn moderate(
        &self,
        shop: &str,
        id: Uuid,
        change: &ReviewModeration,
    ) -> Result<Option<Review>> {
        let (reply_changed, reply) = match &change.reply {
            Some(reply) => (true, reply.as_deref()),
            None => (false, None),
        };

        let review = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews SET
                status = COALESCE($3::text, status),
                reply = CASE WHEN $4 THEN $5::text ELSE reply END,
                replied_at = CASE
                    WHEN NOT $4 THEN replied_at
                    WHEN $5::text IS NULL THEN NULL
                    ELSE now()
                END
            WHERE shop = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(shop)
        .bind(id)
        .bind(change.status.map(|s| s.as_str()))
        .bind(reply_changed)
        .bind(reply)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn delete(&self, shop: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE shop = $1 AND id = $2")
            .bind(shop)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
