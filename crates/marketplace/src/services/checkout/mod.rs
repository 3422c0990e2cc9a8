//! Quote and checkout orchestration.
//!
//! A checkout prices the items, claims the signup discount if it was applied,
//! checks the client's expected total, writes the reservation and finally
//! marks the applied discounts used. When the signup claim loses a race the
//! bundle is re-read and re-priced, up to `max_claim_attempts` times.

mod error;

pub use error::CheckoutError;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use qreserve_core::{
    DiscountSource, PriceResult, PromotionId, PromotionRejection, ReservationStatus, UserId,
    compute_price,
};

use crate::db::{DiscountRepository, ReservationRepository};
use crate::models::{NewReservation, NewReservationItem, Reservation, items_total};
use crate::services::consumption::{ClaimOutcome, ConsumptionManager};
use crate::services::discounts::DiscountService;

/// Largest accepted gap between the client's expected total and ours.
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// A checkout as submitted by the client.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub items: Vec<NewReservationItem>,
    pub promotion_id: Option<PromotionId>,
    /// Total the client displayed, if it sent one.
    pub expected_total: Option<Decimal>,
}

/// A priced bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(flatten)]
    pub price: PriceResult,
    /// The promotion that contributed to the price.
    pub applied_promotion_id: Option<PromotionId>,
    pub promotion_rejection: Option<PromotionRejection>,
}

/// A completed checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub reservation: Reservation,
    pub quote: Quote,
    /// Non-fatal problems, such as a discount that could not be marked used.
    pub warnings: Vec<String>,
    pub claim_attempts: u32,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    discounts: &'a dyn DiscountRepository,
    reservations: &'a dyn ReservationRepository,
    max_claim_attempts: u32,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(
        discounts: &'a dyn DiscountRepository,
        reservations: &'a dyn ReservationRepository,
        max_claim_attempts: u32,
    ) -> Self {
        Self {
            discounts,
            reservations,
            max_claim_attempts: max_claim_attempts.max(1),
        }
    }

    /// Price a set of items without side effects.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyReservation` or `CheckoutError::InvalidItem`
    /// for bad items, `CheckoutError::Pricing` for invalid discounts.
    #[instrument(skip(self, items), fields(user_id = %user_id, items = items.len()))]
    pub async fn quote(
        &self,
        user_id: UserId,
        items: &[NewReservationItem],
        promotion_id: Option<PromotionId>,
        now: DateTime<Utc>,
    ) -> Result<Quote, CheckoutError> {
        let original = validated_total(items)?;
        self.price(user_id, original, promotion_id, now).await
    }

    /// Price, claim, persist and consume.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyReservation` / `InvalidItem` / `Pricing` before anything is written
    /// - `CheckoutError::ClaimConflict` when every claim attempt lost its race
    /// - `CheckoutError::PriceMismatch` when the expected total is stale
    /// - `CheckoutError::Persistence` when the reservation write failed
    #[instrument(skip(self, request), fields(user_id = %request.user_id, items = request.items.len()))]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let user_id = request.user_id;
        let original = validated_total(&request.items)?;
        let consumption = ConsumptionManager::new(self.discounts);

        let mut attempts = 0;
        let (quote, claimed) = loop {
            attempts += 1;
            let quote = self.price(user_id, original, request.promotion_id, now).await?;
            match consumption
                .claim_single_use(user_id, &quote.price.sources())
                .await?
            {
                ClaimOutcome::NotRequired => break (quote, false),
                ClaimOutcome::Claimed => break (quote, true),
                ClaimOutcome::Conflict if attempts >= self.max_claim_attempts => {
                    return Err(CheckoutError::ClaimConflict { attempts });
                }
                ClaimOutcome::Conflict => {
                    warn!(attempts, "Signup claim lost, re-pricing");
                }
            }
        };

        if let Some(expected) = request.expected_total {
            let computed = quote.price.final_price;
            if (expected - computed).abs() > PRICE_TOLERANCE {
                if claimed {
                    self.release(user_id).await;
                }
                info!(%expected, %computed, "Expected total is stale");
                return Err(CheckoutError::PriceMismatch { expected, computed });
            }
        }

        let new_reservation = NewReservation {
            user_id,
            status: ReservationStatus::Confirmed,
            original_price: quote.price.original_price,
            total_price: quote.price.final_price,
            total_discount: quote.price.total_discount,
            applied_promotion_id: quote.applied_promotion_id,
            applied_discounts: quote.price.applied_discounts.clone(),
            items: request.items,
        };

        let reservation = match self.reservations.create_reservation(new_reservation).await {
            Ok(reservation) => reservation,
            Err(e) => {
                if claimed {
                    self.release(user_id).await;
                }
                return Err(CheckoutError::Persistence(e));
            }
        };

        let mut warnings = Vec::new();
        if let Err(e) = consumption.mark_used(user_id, &quote.price.sources()).await {
            error!(
                reservation_id = %reservation.id,
                error = %e,
                "Failed to mark discounts used"
            );
            warnings.push(format!("applied discounts could not be marked used: {e}"));
        }

        info!(
            reservation_id = %reservation.id,
            final_price = %reservation.total_price,
            discounts = reservation.applied_discounts.len(),
            "Checkout completed"
        );

        Ok(CheckoutReceipt {
            reservation,
            quote,
            warnings,
            claim_attempts: attempts,
        })
    }

    async fn price(
        &self,
        user_id: UserId,
        original: Decimal,
        promotion_id: Option<PromotionId>,
        now: DateTime<Utc>,
    ) -> Result<Quote, CheckoutError> {
        let gathered = DiscountService::new(self.discounts)
            .gather_bundle(user_id, promotion_id, now)
            .await?;
        let price = compute_price(original, &gathered.bundle)?;
        let applied_promotion_id = gathered
            .bundle
            .promotion
            .as_ref()
            .filter(|_| price.applies(DiscountSource::Promotion))
            .map(|p| p.id);

        Ok(Quote {
            price,
            applied_promotion_id,
            promotion_rejection: gathered.promotion_rejection,
        })
    }

    async fn release(&self, user_id: UserId) {
        if let Err(e) = ConsumptionManager::new(self.discounts)
            .release_claim(user_id)
            .await
        {
            error!(error = %e, "Failed to release signup claim");
        }
    }
}

fn validated_total(items: &[NewReservationItem]) -> Result<Decimal, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyReservation);
    }
    for item in items {
        item.validate().map_err(CheckoutError::InvalidItem)?;
    }
    items_total(items).ok_or_else(|| {
        CheckoutError::InvalidItem("reservation total exceeds the maximum amount".to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use qreserve_core::{
        DiscountType, LoyaltyDiscount, Promotion, ServiceId, SignupDiscount,
    };

    use super::*;
    use crate::db::{InMemoryStore, RepositoryError};
    use crate::models::{NewPromotion, UserDiscounts};

    const USER: UserId = UserId::new(41);

    fn item(price: i64) -> NewReservationItem {
        let start = Utc::now() + Duration::days(2);
        NewReservationItem {
            service_id: ServiceId::new(8),
            specific_service_id: Some(2),
            price: Decimal::from(price),
            quantity: 1,
            start_time: start,
            end_time: start + Duration::hours(2),
        }
    }

    fn request(price: i64) -> CheckoutRequest {
        CheckoutRequest {
            user_id: USER,
            items: vec![item(price)],
            promotion_id: None,
            expected_total: None,
        }
    }

    fn signup(is_used: bool) -> SignupDiscount {
        SignupDiscount {
            user_id: USER,
            discount: Decimal::from(10),
            discount_type: DiscountType::Percentage,
            is_used,
        }
    }

    fn loyalty() -> LoyaltyDiscount {
        LoyaltyDiscount {
            user_id: USER,
            discount: Decimal::from(5),
            discount_type: DiscountType::Percentage,
            threshold: 5,
            is_used: false,
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_signup_discount(signup(false)).await;
        store.insert_loyalty_discount(loyalty()).await;
        store
            .insert_promotion(Promotion {
                id: PromotionId::new(1),
                title: "Spring Sale".to_string(),
                description: None,
                discount: Decimal::from(5),
                discount_type: DiscountType::Fixed,
                is_active: true,
                start_date: None,
                end_date: None,
            })
            .await;
        store
    }

    #[tokio::test]
    async fn test_checkout_stacks_and_consumes() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);
        let mut req = request(200);
        req.promotion_id = Some(PromotionId::new(1));

        let receipt = service.checkout(req, Utc::now()).await.unwrap();

        assert_eq!(receipt.reservation.total_price, Decimal::from(165));
        assert_eq!(receipt.reservation.original_price, Decimal::from(200));
        assert_eq!(receipt.reservation.total_discount, Decimal::from(35));
        assert_eq!(receipt.reservation.applied_promotion_id, Some(PromotionId::new(1)));
        assert_eq!(receipt.reservation.applied_discounts.len(), 3);
        assert!(receipt.warnings.is_empty());
        assert_eq!(receipt.claim_attempts, 1);

        let records = store.find_user_discounts(USER).await.unwrap();
        assert!(records.signup_discount.unwrap().is_used);
        assert!(records.loyalty_discount.unwrap().is_used);
    }

    #[tokio::test]
    async fn test_single_use_after_checkout() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);

        let first = service.checkout(request(100), Utc::now()).await.unwrap();
        assert!(first.quote.price.applies(DiscountSource::Signup));

        let second = service.checkout(request(100), Utc::now()).await.unwrap();
        assert!(second.quote.price.applied_discounts.is_empty());
        assert_eq!(second.reservation.total_price, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_quote_has_no_side_effects() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);

        let quote = service
            .quote(USER, &[item(300)], None, Utc::now())
            .await
            .unwrap();
        assert_eq!(quote.price.final_price, Decimal::new(25500, 2));

        let records = store.find_user_discounts(USER).await.unwrap();
        assert!(!records.signup_discount.unwrap().is_used);
        assert!(store.list_for_user(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_invalid_items_rejected() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);

        let mut empty = request(100);
        empty.items.clear();
        assert!(matches!(
            service.checkout(empty, Utc::now()).await,
            Err(CheckoutError::EmptyReservation)
        ));

        let mut bad = request(100);
        bad.items[0].quantity = 0;
        assert!(matches!(
            service.checkout(bad, Utc::now()).await,
            Err(CheckoutError::InvalidItem(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_totals_rejected_before_claim() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);

        let mut huge = request(0);
        huge.items[0].price = Decimal::MAX;
        huge.items[0].quantity = 2;
        assert!(matches!(
            service.quote(USER, &huge.items, None, Utc::now()).await,
            Err(CheckoutError::InvalidItem(_))
        ));

        let mut summed = request(0);
        summed.items[0].price = Decimal::new(999_999_999_999, 2);
        summed.items.push(summed.items[0].clone());
        assert!(matches!(
            service.checkout(summed, Utc::now()).await,
            Err(CheckoutError::InvalidItem(_))
        ));

        let records = store.find_user_discounts(USER).await.unwrap();
        assert!(!records.signup_discount.unwrap().is_used);
        assert!(store.list_for_user(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_mismatch_releases_claim() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);
        let mut req = request(200);
        req.expected_total = Some(Decimal::from(200));

        let err = service.checkout(req, Utc::now()).await.unwrap_err();
        let CheckoutError::PriceMismatch { expected, computed } = err else {
            panic!("expected price mismatch, got {err:?}");
        };
        assert_eq!(expected, Decimal::from(200));
        assert_eq!(computed, Decimal::from(170));

        let records = store.find_user_discounts(USER).await.unwrap();
        assert!(!records.signup_discount.unwrap().is_used);
        assert!(store.list_for_user(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expected_total_within_tolerance() {
        let store = seeded().await;
        let service = CheckoutService::new(&store, &store, 3);
        let mut req = request(200);
        req.expected_total = Some(Decimal::new(17001, 2));

        let receipt = service.checkout(req, Utc::now()).await.unwrap();
        assert_eq!(receipt.reservation.total_price, Decimal::from(170));
    }

    #[tokio::test]
    async fn test_persistence_failure_releases_claim() {
        let store = seeded().await;
        store.fail_reservation_writes(true);
        let service = CheckoutService::new(&store, &store, 3);

        let result = service.checkout(request(200), Utc::now()).await;
        assert!(matches!(result, Err(CheckoutError::Persistence(_))));

        let records = store.find_user_discounts(USER).await.unwrap();
        assert!(!records.signup_discount.unwrap().is_used);
        assert!(!records.loyalty_discount.unwrap().is_used);
    }

    #[tokio::test]
    async fn test_mark_used_failure_is_a_warning() {
        let store = seeded().await;
        store.fail_loyalty_writes(true);
        let service = CheckoutService::new(&store, &store, 3);

        let receipt = service.checkout(request(200), Utc::now()).await.unwrap();
        assert_eq!(receipt.warnings.len(), 1);
        assert!(store.find_reservation(receipt.reservation.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_share_one_signup() {
        let store = InMemoryStore::new();
        store.insert_signup_discount(signup(false)).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    CheckoutService::new(&store, &store, 3)
                        .checkout(request(100), Utc::now())
                        .await
                })
            })
            .collect();

        let mut with_signup = 0;
        for task in tasks {
            let receipt = task.await.unwrap().unwrap();
            if receipt.quote.price.applies(DiscountSource::Signup) {
                with_signup += 1;
                assert_eq!(receipt.reservation.total_price, Decimal::from(90));
            } else {
                assert_eq!(receipt.reservation.total_price, Decimal::from(100));
            }
        }
        assert_eq!(with_signup, 1);
    }

    /// Serves a stale unused signup record for the first `stale_reads` lookups.
    struct StaleSignupStore {
        inner: InMemoryStore,
        stale_reads: AtomicU32,
    }

    #[async_trait]
    impl DiscountRepository for StaleSignupStore {
        async fn find_user_discounts(
            &self,
            user_id: UserId,
        ) -> Result<UserDiscounts, RepositoryError> {
            let mut records = self.inner.find_user_discounts(user_id).await?;
            let stale = self
                .stale_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale && let Some(signup) = records.signup_discount.as_mut() {
                signup.is_used = false;
            }
            Ok(records)
        }

        async fn find_promotion(
            &self,
            id: PromotionId,
        ) -> Result<Option<Promotion>, RepositoryError> {
            self.inner.find_promotion(id).await
        }

        async fn list_promotions(
            &self,
            active_at: Option<DateTime<Utc>>,
        ) -> Result<Vec<Promotion>, RepositoryError> {
            self.inner.list_promotions(active_at).await
        }

        async fn create_promotion(
            &self,
            promotion: NewPromotion,
        ) -> Result<Promotion, RepositoryError> {
            self.inner.create_promotion(promotion).await
        }

        async fn grant_signup_discount(
            &self,
            user_id: UserId,
            discount: Decimal,
            discount_type: DiscountType,
        ) -> Result<SignupDiscount, RepositoryError> {
            self.inner
                .grant_signup_discount(user_id, discount, discount_type)
                .await
        }

        async fn claim_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError> {
            self.inner.claim_signup_discount(user_id).await
        }

        async fn release_signup_discount(
            &self,
            user_id: UserId,
        ) -> Result<bool, RepositoryError> {
            self.inner.release_signup_discount(user_id).await
        }

        async fn set_loyalty_used(
            &self,
            user_id: UserId,
            is_used: bool,
        ) -> Result<Option<LoyaltyDiscount>, RepositoryError> {
            self.inner.set_loyalty_used(user_id, is_used).await
        }

        async fn upsert_loyalty_tier(
            &self,
            discount: LoyaltyDiscount,
        ) -> Result<LoyaltyDiscount, RepositoryError> {
            self.inner.upsert_loyalty_tier(discount).await
        }
    }

    async fn stale_store(stale_reads: u32) -> StaleSignupStore {
        let inner = InMemoryStore::new();
        inner.insert_signup_discount(signup(true)).await;
        StaleSignupStore {
            inner,
            stale_reads: AtomicU32::new(stale_reads),
        }
    }

    #[tokio::test]
    async fn test_claim_conflict_reprices_without_signup() {
        let store = stale_store(1).await;
        let service = CheckoutService::new(&store, &store.inner, 3);

        let receipt = service.checkout(request(100), Utc::now()).await.unwrap();
        assert_eq!(receipt.claim_attempts, 2);
        assert!(!receipt.quote.price.applies(DiscountSource::Signup));
        assert_eq!(receipt.reservation.total_price, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_claim_conflict_retries_are_bounded() {
        let store = stale_store(10).await;
        let service = CheckoutService::new(&store, &store.inner, 3);

        let result = service.checkout(request(100), Utc::now()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::ClaimConflict { attempts: 3 })
        ));
        assert!(store.inner.list_for_user(USER).await.unwrap().is_empty());
    }
}
