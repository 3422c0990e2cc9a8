//! `PostgreSQL` discount and promotion repository.
//!
//! Queries are runtime-checked (`sqlx::query_as`) so the crate builds without
//! a live database or an offline query cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use qreserve_core::{
    DiscountType, LoyaltyDiscount, Promotion, PromotionId, SignupDiscount, UserId,
};

use super::{DiscountRepository, RepositoryError, conflict_on_unique};
use crate::models::{NewPromotion, UserDiscounts};

const PROMOTION_COLUMNS: &str =
    "id, title, description, discount, discount_type, is_active, start_date, end_date";

/// Repository for discount tables in the `marketplace` schema.
#[derive(Debug, Clone)]
pub struct PgDiscountRepository {
    pool: PgPool,
}

impl PgDiscountRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscountRepository for PgDiscountRepository {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn find_user_discounts(&self, user_id: UserId) -> Result<UserDiscounts, RepositoryError> {
        let signup_discount: Option<SignupDiscount> = sqlx::query_as(
            r"
            SELECT user_id, discount, discount_type, is_used
            FROM marketplace.signup_discount
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let loyalty_discount: Option<LoyaltyDiscount> = sqlx::query_as(
            r"
            SELECT user_id, discount, discount_type, threshold, is_used
            FROM marketplace.loyalty_discount
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(UserDiscounts {
            signup_discount,
            loyalty_discount,
        })
    }

    async fn find_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        let query = format!("SELECT {PROMOTION_COLUMNS} FROM marketplace.promotion WHERE id = $1");
        let promotion = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(promotion)
    }

    async fn list_promotions(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let query = format!(
            r"
            SELECT {PROMOTION_COLUMNS}
            FROM marketplace.promotion
            WHERE $1::timestamptz IS NULL
               OR (is_active
                   AND (start_date IS NULL OR start_date <= $1)
                   AND (end_date IS NULL OR end_date >= $1))
            ORDER BY id
            "
        );
        let promotions = sqlx::query_as(&query)
            .bind(active_at)
            .fetch_all(&self.pool)
            .await?;
        Ok(promotions)
    }

    #[instrument(skip(self, promotion), fields(title = %promotion.title))]
    async fn create_promotion(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError> {
        let query = format!(
            r"
            INSERT INTO marketplace.promotion
                (title, description, discount, discount_type, is_active, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROMOTION_COLUMNS}
            "
        );
        let created: Promotion = sqlx::query_as(&query)
            .bind(&promotion.title)
            .bind(&promotion.description)
            .bind(promotion.discount)
            .bind(promotion.discount_type)
            .bind(promotion.is_active)
            .bind(promotion.start_date)
            .bind(promotion.end_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "promotion already exists"))?;

        debug!(id = %created.id, "Created promotion");
        Ok(created)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn grant_signup_discount(
        &self,
        user_id: UserId,
        discount: Decimal,
        discount_type: DiscountType,
    ) -> Result<SignupDiscount, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO marketplace.signup_discount (user_id, discount, discount_type, is_used)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(discount)
        .bind(discount_type)
        .execute(&self.pool)
        .await?;

        let record: SignupDiscount = sqlx::query_as(
            r"
            SELECT user_id, discount, discount_type, is_used
            FROM marketplace.signup_discount
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn claim_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.signup_discount
            SET is_used = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND is_used = FALSE
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.signup_discount
            SET is_used = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_used = TRUE
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_loyalty_used(
        &self,
        user_id: UserId,
        is_used: bool,
    ) -> Result<Option<LoyaltyDiscount>, RepositoryError> {
        let record = sqlx::query_as(
            r"
            UPDATE marketplace.loyalty_discount
            SET is_used = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, discount, discount_type, threshold, is_used
            ",
        )
        .bind(user_id)
        .bind(is_used)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, discount), fields(user_id = %discount.user_id, threshold = discount.threshold))]
    async fn upsert_loyalty_tier(
        &self,
        discount: LoyaltyDiscount,
    ) -> Result<LoyaltyDiscount, RepositoryError> {
        let stored = sqlx::query_as(
            r"
            INSERT INTO marketplace.loyalty_discount
                (user_id, discount, discount_type, threshold, is_used)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET discount = EXCLUDED.discount,
                discount_type = EXCLUDED.discount_type,
                threshold = EXCLUDED.threshold,
                updated_at = NOW()
            RETURNING user_id, discount, discount_type, threshold, is_used
            ",
        )
        .bind(discount.user_id)
        .bind(discount.discount)
        .bind(discount.discount_type)
        .bind(discount.threshold)
        .bind(discount.is_used)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }
}
