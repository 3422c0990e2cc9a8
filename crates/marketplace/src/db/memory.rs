//! In-memory repository backend.
//!
//! Backs the test suites and local runs without `PostgreSQL`. All state sits
//! behind one mutex, so every trait method is atomic like its SQL counterpart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use qreserve_core::{
    DiscountType, LoyaltyDiscount, Promotion, PromotionId, ReservationId, ReservationItemId,
    ReservationStatus, SignupDiscount, UserId,
};

use super::{DiscountRepository, RepositoryError, ReservationRepository};
use crate::models::{
    CompletionOutcome, NewPromotion, NewReservation, Reservation, ReservationItem, UserDiscounts,
};

#[derive(Debug, Default)]
struct State {
    signup: HashMap<UserId, SignupDiscount>,
    loyalty: HashMap<UserId, LoyaltyDiscount>,
    promotions: BTreeMap<PromotionId, Promotion>,
    reservations: BTreeMap<ReservationId, Reservation>,
    completed: HashMap<UserId, i64>,
    next_promotion_id: i32,
    next_reservation_id: i32,
    next_item_id: i32,
}

/// Shared in-memory store implementing both repository traits.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_reservation_writes: Arc<AtomicBool>,
    fail_loyalty_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a signup discount record directly.
    pub async fn insert_signup_discount(&self, discount: SignupDiscount) {
        self.state.lock().await.signup.insert(discount.user_id, discount);
    }

    /// Seed a loyalty discount record directly.
    pub async fn insert_loyalty_discount(&self, discount: LoyaltyDiscount) {
        self.state.lock().await.loyalty.insert(discount.user_id, discount);
    }

    /// Seed a promotion directly, keeping its id.
    pub async fn insert_promotion(&self, promotion: Promotion) {
        let mut state = self.state.lock().await;
        state.next_promotion_id = state.next_promotion_id.max(promotion.id.as_i32());
        state.promotions.insert(promotion.id, promotion);
    }

    /// Seed the completion count for a user.
    pub async fn set_completed_count(&self, user_id: UserId, count: i64) {
        self.state.lock().await.completed.insert(user_id, count);
    }

    /// Make subsequent reservation inserts fail with a database error.
    pub fn fail_reservation_writes(&self, fail: bool) {
        self.fail_reservation_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent loyalty flag and tier writes fail with a database error.
    pub fn fail_loyalty_writes(&self, fail: bool) {
        self.fail_loyalty_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(flag: &AtomicBool) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn find_user_discounts(&self, user_id: UserId) -> Result<UserDiscounts, RepositoryError> {
        let state = self.state.lock().await;
        Ok(UserDiscounts {
            signup_discount: state.signup.get(&user_id).cloned(),
            loyalty_discount: state.loyalty.get(&user_id).cloned(),
        })
    }

    async fn find_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        Ok(self.state.lock().await.promotions.get(&id).cloned())
    }

    async fn list_promotions(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .promotions
            .values()
            .filter(|p| active_at.is_none_or(|now| p.is_usable_at(now)))
            .cloned()
            .collect())
    }

    async fn create_promotion(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError> {
        let mut state = self.state.lock().await;
        state.next_promotion_id += 1;
        let created = Promotion {
            id: PromotionId::new(state.next_promotion_id),
            title: promotion.title,
            description: promotion.description,
            discount: promotion.discount,
            discount_type: promotion.discount_type,
            is_active: promotion.is_active,
            start_date: promotion.start_date,
            end_date: promotion.end_date,
        };
        state.promotions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn grant_signup_discount(
        &self,
        user_id: UserId,
        discount: Decimal,
        discount_type: DiscountType,
    ) -> Result<SignupDiscount, RepositoryError> {
        let mut state = self.state.lock().await;
        let record = state.signup.entry(user_id).or_insert(SignupDiscount {
            user_id,
            discount,
            discount_type,
            is_used: false,
        });
        Ok(record.clone())
    }

    async fn claim_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.signup.get_mut(&user_id) {
            Some(record) if !record.is_used => {
                record.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.signup.get_mut(&user_id) {
            Some(record) if record.is_used => {
                record.is_used = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_loyalty_used(
        &self,
        user_id: UserId,
        is_used: bool,
    ) -> Result<Option<LoyaltyDiscount>, RepositoryError> {
        Self::injected(&self.fail_loyalty_writes)?;
        let mut state = self.state.lock().await;
        Ok(state.loyalty.get_mut(&user_id).map(|record| {
            record.is_used = is_used;
            record.clone()
        }))
    }

    async fn upsert_loyalty_tier(
        &self,
        discount: LoyaltyDiscount,
    ) -> Result<LoyaltyDiscount, RepositoryError> {
        Self::injected(&self.fail_loyalty_writes)?;
        let mut state = self.state.lock().await;
        let is_used = state
            .loyalty
            .get(&discount.user_id)
            .is_some_and(|existing| existing.is_used);
        let stored = LoyaltyDiscount { is_used, ..discount };
        state.loyalty.insert(stored.user_id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn create_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, RepositoryError> {
        Self::injected(&self.fail_reservation_writes)?;
        let mut state = self.state.lock().await;
        state.next_reservation_id += 1;
        let id = ReservationId::new(state.next_reservation_id);

        let mut items = Vec::with_capacity(reservation.items.len());
        for item in reservation.items {
            state.next_item_id += 1;
            items.push(ReservationItem {
                id: ReservationItemId::new(state.next_item_id),
                service_id: item.service_id,
                specific_service_id: item.specific_service_id,
                price: item.price,
                quantity: item.quantity,
                start_time: item.start_time,
                end_time: item.end_time,
            });
        }

        let created = Reservation {
            id,
            user_id: reservation.user_id,
            status: reservation.status,
            original_price: reservation.original_price,
            total_price: reservation.total_price,
            total_discount: reservation.total_discount,
            applied_promotion_id: reservation.applied_promotion_id,
            applied_discounts: reservation.applied_discounts,
            items,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.reservations.insert(id, created.clone());
        Ok(created)
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn complete_reservation(
        &self,
        id: ReservationId,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(reservation) = state.reservations.get_mut(&id) else {
            return Ok(CompletionOutcome::NotFound);
        };

        match reservation.status {
            ReservationStatus::Completed => {
                return Ok(CompletionOutcome::AlreadyCompleted(reservation.clone()));
            }
            status if !status.can_complete() => {
                return Ok(CompletionOutcome::NotCompletable(status));
            }
            _ => {}
        }

        reservation.status = ReservationStatus::Completed;
        reservation.completed_at = Some(at);
        let completed = reservation.clone();
        *state.completed.entry(completed.user_id).or_insert(0) += 1;
        Ok(CompletionOutcome::Completed(completed))
    }

    async fn count_completed(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .completed
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }
}
