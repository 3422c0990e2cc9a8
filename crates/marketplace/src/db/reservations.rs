//! `PostgreSQL` reservation repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

use qreserve_core::{
    AppliedDiscount, PromotionId, ReservationId, ReservationItemId, ReservationStatus, ServiceId,
    UserId,
};

use super::{RepositoryError, ReservationRepository};
use crate::models::{CompletionOutcome, NewReservation, Reservation, ReservationItem};

const RESERVATION_COLUMNS: &str = "id, user_id, status, original_price, total_price, \
     total_discount, applied_promotion_id, applied_discounts, created_at, completed_at";

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: ReservationId,
    user_id: UserId,
    status: ReservationStatus,
    original_price: Decimal,
    total_price: Decimal,
    total_discount: Decimal,
    applied_promotion_id: Option<PromotionId>,
    applied_discounts: Json<Vec<AppliedDiscount>>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    fn into_reservation(self, items: Vec<ReservationItem>) -> Reservation {
        Reservation {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            original_price: self.original_price,
            total_price: self.total_price,
            total_discount: self.total_discount,
            applied_promotion_id: self.applied_promotion_id,
            applied_discounts: self.applied_discounts.0,
            items,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: ReservationItemId,
    reservation_id: ReservationId,
    service_id: ServiceId,
    specific_service_id: Option<i32>,
    price: Decimal,
    quantity: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<ItemRow> for ReservationItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            service_id: row.service_id,
            specific_service_id: row.specific_service_id,
            price: row.price,
            quantity: row.quantity,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

/// Repository for reservation tables in the `marketplace` schema.
#[derive(Debug, Clone)]
pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(
        &self,
        reservation_ids: &[i32],
    ) -> Result<HashMap<ReservationId, Vec<ReservationItem>>, RepositoryError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT id, reservation_id, service_id, specific_service_id,
                   price, quantity, start_time, end_time
            FROM marketplace.reservation_item
            WHERE reservation_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(reservation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<ReservationId, Vec<ReservationItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.reservation_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<ReservationRow>) -> Result<Vec<Reservation>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let mut items = self.load_items(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let row_items = items.remove(&row.id).unwrap_or_default();
                row.into_reservation(row_items)
            })
            .collect())
    }
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    #[instrument(skip(self, reservation), fields(user_id = %reservation.user_id, items = reservation.items.len()))]
    async fn create_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r"
            INSERT INTO marketplace.reservation
                (user_id, status, original_price, total_price, total_discount,
                 applied_promotion_id, applied_discounts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RESERVATION_COLUMNS}
            "
        );
        let row: ReservationRow = sqlx::query_as(&query)
            .bind(reservation.user_id)
            .bind(reservation.status)
            .bind(reservation.original_price)
            .bind(reservation.total_price)
            .bind(reservation.total_discount)
            .bind(reservation.applied_promotion_id)
            .bind(Json(&reservation.applied_discounts))
            .fetch_one(&mut *tx)
            .await?;

        let mut items = Vec::with_capacity(reservation.items.len());
        for item in &reservation.items {
            let item_row: ItemRow = sqlx::query_as(
                r"
                INSERT INTO marketplace.reservation_item
                    (reservation_id, service_id, specific_service_id, price, quantity,
                     start_time, end_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, reservation_id, service_id, specific_service_id,
                          price, quantity, start_time, end_time
                ",
            )
            .bind(row.id)
            .bind(item.service_id)
            .bind(item.specific_service_id)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.start_time)
            .bind(item.end_time)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item_row.into());
        }

        tx.commit().await?;

        debug!(id = %row.id, "Created reservation");
        Ok(row.into_reservation(items))
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let query =
            format!("SELECT {RESERVATION_COLUMNS} FROM marketplace.reservation WHERE id = $1");
        let row: Option<ReservationRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>, RepositoryError> {
        let query = format!(
            r"
            SELECT {RESERVATION_COLUMNS}
            FROM marketplace.reservation
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        );
        let rows: Vec<ReservationRow> = sqlx::query_as(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    #[instrument(skip(self), fields(reservation_id = %id))]
    async fn complete_reservation(
        &self,
        id: ReservationId,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<(ReservationStatus,)> = sqlx::query_as(
            "SELECT status FROM marketplace.reservation WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status,)) = status else {
            return Ok(CompletionOutcome::NotFound);
        };

        if status == ReservationStatus::Completed {
            tx.commit().await?;
            return match self.find_reservation(id).await? {
                Some(reservation) => Ok(CompletionOutcome::AlreadyCompleted(reservation)),
                None => Ok(CompletionOutcome::NotFound),
            };
        }
        if !status.can_complete() {
            return Ok(CompletionOutcome::NotCompletable(status));
        }

        sqlx::query(
            r"
            UPDATE marketplace.reservation
            SET status = 'completed', completed_at = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO marketplace.completed_reservation (reservation_id, user_id, completed_at)
            SELECT id, user_id, $2 FROM marketplace.reservation WHERE id = $1
            ON CONFLICT (reservation_id) DO NOTHING
            ",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let reservation = self
            .find_reservation(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(CompletionOutcome::Completed(reservation))
    }

    async fn count_completed(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM marketplace.completed_reservation WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
