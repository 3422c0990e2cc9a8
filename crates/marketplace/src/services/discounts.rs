//! Discount lookup and manual discount state changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use qreserve_core::{
    DiscountBundle, DiscountType, LoyaltyTier, LoyaltyTiers, Promotion, PromotionId,
    PromotionRejection, SignupDiscount, UserId,
};

use crate::db::{DiscountRepository, RepositoryError};
use crate::models::UserDiscounts;

/// Errors from discount operations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// A consumed signup discount cannot be handed back.
    #[error("signup discount cannot be marked unused once consumed")]
    SignupIrreversible,

    /// The user has no discount of this kind.
    #[error("user has no {0} discount")]
    NotFound(DiscountKind),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Per-user discount kinds a user can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Signup,
    Loyalty,
}

impl std::fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::Loyalty => write!(f, "loyalty"),
        }
    }
}

/// A bundle ready for pricing plus why a requested promotion was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredBundle {
    pub bundle: DiscountBundle,
    pub promotion_rejection: Option<PromotionRejection>,
}

/// Discount state as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountSummary {
    pub user_id: UserId,
    /// A signup discount exists and is still unused.
    pub has_signup_discount: bool,
    pub signup_discount_amount: Option<Decimal>,
    pub signup_discount_type: Option<DiscountType>,
    pub signup_discount_used: Option<bool>,
    /// A loyalty discount exists and is not on hold.
    pub has_loyalty_discount: bool,
    pub loyalty_discount_amount: Option<Decimal>,
    pub loyalty_discount_type: Option<DiscountType>,
    pub loyalty_threshold: Option<i32>,
    pub loyalty_discount_used: Option<bool>,
    pub completed_reservations: i64,
    pub next_loyalty_tier: Option<LoyaltyTier>,
}

impl DiscountSummary {
    /// Summarize stored records for display.
    #[must_use]
    pub fn new(
        user_id: UserId,
        records: &UserDiscounts,
        completed_reservations: i64,
        tiers: &LoyaltyTiers,
    ) -> Self {
        let signup = records.signup_discount.as_ref();
        let loyalty = records.loyalty_discount.as_ref();
        Self {
            user_id,
            has_signup_discount: signup.is_some_and(|s| !s.is_used),
            signup_discount_amount: signup.map(|s| s.discount),
            signup_discount_type: signup.map(|s| s.discount_type),
            signup_discount_used: signup.map(|s| s.is_used),
            has_loyalty_discount: loyalty.is_some_and(|l| !l.is_used),
            loyalty_discount_amount: loyalty.map(|l| l.discount),
            loyalty_discount_type: loyalty.map(|l| l.discount_type),
            loyalty_threshold: loyalty.map(|l| l.threshold),
            loyalty_discount_used: loyalty.map(|l| l.is_used),
            completed_reservations,
            next_loyalty_tier: tiers.next_tier(completed_reservations).cloned(),
        }
    }
}

/// Discount service.
pub struct DiscountService<'a> {
    discounts: &'a dyn DiscountRepository,
}

impl<'a> DiscountService<'a> {
    #[must_use]
    pub const fn new(discounts: &'a dyn DiscountRepository) -> Self {
        Self { discounts }
    }

    /// Look up a promotion and check it can be applied at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn usable_promotion(
        &self,
        id: PromotionId,
        now: DateTime<Utc>,
    ) -> Result<Result<Promotion, PromotionRejection>, RepositoryError> {
        let Some(promotion) = self.discounts.find_promotion(id).await? else {
            return Ok(Err(PromotionRejection::NotFound));
        };
        Ok(promotion.check_usable(now).map(|()| promotion))
    }

    /// Gather the candidate discounts for one checkout.
    ///
    /// A promotion that is missing or not usable at `now` is left out of the
    /// bundle and reported in `promotion_rejection`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a lookup fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn gather_bundle(
        &self,
        user_id: UserId,
        promotion_id: Option<PromotionId>,
        now: DateTime<Utc>,
    ) -> Result<GatheredBundle, RepositoryError> {
        let records = self.discounts.find_user_discounts(user_id).await?;

        let (promotion, promotion_rejection) = match promotion_id {
            Some(id) => match self.usable_promotion(id, now).await? {
                Ok(promotion) => (Some(promotion), None),
                Err(rejection) => {
                    debug!(promotion_id = %id, %rejection, "Promotion left out of bundle");
                    (None, Some(rejection))
                }
            },
            None => (None, None),
        };

        Ok(GatheredBundle {
            bundle: DiscountBundle {
                signup_discount: records.signup_discount,
                loyalty_discount: records.loyalty_discount,
                promotion,
            },
            promotion_rejection,
        })
    }

    /// Grant the signup discount if the user does not have one yet.
    ///
    /// # Errors
    ///
    /// Returns `DiscountError::Repository` if the write fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn grant_signup(
        &self,
        user_id: UserId,
        discount: Decimal,
        discount_type: DiscountType,
    ) -> Result<SignupDiscount, DiscountError> {
        let record = self
            .discounts
            .grant_signup_discount(user_id, discount, discount_type)
            .await?;
        info!(is_used = record.is_used, "Signup discount granted");
        Ok(record)
    }

    /// Manually set a discount's `is_used` flag.
    ///
    /// Loyalty is a reversible hold. Signup can only move to used.
    ///
    /// # Errors
    ///
    /// Returns `DiscountError::SignupIrreversible` when un-consuming a signup
    /// discount, `DiscountError::NotFound` when the user has no such discount.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_used(
        &self,
        user_id: UserId,
        kind: DiscountKind,
        is_used: bool,
    ) -> Result<UserDiscounts, DiscountError> {
        match kind {
            DiscountKind::Signup => {
                if !is_used {
                    return Err(DiscountError::SignupIrreversible);
                }
                let records = self.discounts.find_user_discounts(user_id).await?;
                if records.signup_discount.is_none() {
                    return Err(DiscountError::NotFound(kind));
                }
                // Already-used keeps the flag as is.
                self.discounts.claim_signup_discount(user_id).await?;
            }
            DiscountKind::Loyalty => {
                self.discounts
                    .set_loyalty_used(user_id, is_used)
                    .await?
                    .ok_or(DiscountError::NotFound(kind))?;
            }
        }

        info!(%kind, is_used, "Discount flag updated");
        Ok(self.discounts.find_user_discounts(user_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use qreserve_core::LoyaltyDiscount;

    use super::*;
    use crate::db::InMemoryStore;

    const USER: UserId = UserId::new(11);

    fn promotion(id: i32, is_active: bool, end_offset_days: i64) -> Promotion {
        Promotion {
            id: PromotionId::new(id),
            title: format!("Promo {id}"),
            description: None,
            discount: Decimal::from(10),
            discount_type: DiscountType::Percentage,
            is_active,
            start_date: None,
            end_date: Some(Utc::now() + Duration::days(end_offset_days)),
        }
    }

    #[tokio::test]
    async fn test_gather_bundle_drops_expired_promotion() {
        let store = InMemoryStore::new();
        store.insert_promotion(promotion(1, true, -1)).await;
        let service = DiscountService::new(&store);

        let gathered = service
            .gather_bundle(USER, Some(PromotionId::new(1)), Utc::now())
            .await
            .unwrap();
        assert!(gathered.bundle.promotion.is_none());
        assert_eq!(gathered.promotion_rejection, Some(PromotionRejection::Expired));
    }

    #[tokio::test]
    async fn test_gather_bundle_reports_missing_and_inactive() {
        let store = InMemoryStore::new();
        store.insert_promotion(promotion(2, false, 5)).await;
        let service = DiscountService::new(&store);
        let now = Utc::now();

        let missing = service
            .gather_bundle(USER, Some(PromotionId::new(99)), now)
            .await
            .unwrap();
        assert_eq!(missing.promotion_rejection, Some(PromotionRejection::NotFound));

        let inactive = service
            .gather_bundle(USER, Some(PromotionId::new(2)), now)
            .await
            .unwrap();
        assert_eq!(inactive.promotion_rejection, Some(PromotionRejection::Inactive));
    }

    #[tokio::test]
    async fn test_gather_bundle_includes_usable_promotion() {
        let store = InMemoryStore::new();
        store.insert_promotion(promotion(3, true, 5)).await;
        let service = DiscountService::new(&store);

        let gathered = service
            .gather_bundle(USER, Some(PromotionId::new(3)), Utc::now())
            .await
            .unwrap();
        assert_eq!(gathered.bundle.promotion.map(|p| p.id), Some(PromotionId::new(3)));
        assert!(gathered.promotion_rejection.is_none());
    }

    #[tokio::test]
    async fn test_signup_cannot_be_unconsumed() {
        let store = InMemoryStore::new();
        let service = DiscountService::new(&store);
        service
            .grant_signup(USER, Decimal::from(10), DiscountType::Percentage)
            .await
            .unwrap();

        let used = service.set_used(USER, DiscountKind::Signup, true).await.unwrap();
        assert!(used.signup_discount.unwrap().is_used);

        let err = service.set_used(USER, DiscountKind::Signup, false).await;
        assert!(matches!(err, Err(DiscountError::SignupIrreversible)));
    }

    #[tokio::test]
    async fn test_loyalty_hold_is_reversible() {
        let store = InMemoryStore::new();
        store
            .insert_loyalty_discount(LoyaltyDiscount {
                user_id: USER,
                discount: Decimal::from(5),
                discount_type: DiscountType::Percentage,
                threshold: 5,
                is_used: false,
            })
            .await;
        let service = DiscountService::new(&store);

        let held = service.set_used(USER, DiscountKind::Loyalty, true).await.unwrap();
        assert!(held.loyalty_discount.unwrap().is_used);

        let released = service.set_used(USER, DiscountKind::Loyalty, false).await.unwrap();
        assert!(!released.loyalty_discount.unwrap().is_used);
    }

    #[tokio::test]
    async fn test_toggle_missing_discount() {
        let store = InMemoryStore::new();
        let service = DiscountService::new(&store);
        let err = service.set_used(USER, DiscountKind::Loyalty, true).await;
        assert!(matches!(err, Err(DiscountError::NotFound(DiscountKind::Loyalty))));
    }

    #[test]
    fn test_summary_flags() {
        let records = UserDiscounts {
            signup_discount: Some(SignupDiscount {
                user_id: USER,
                discount: Decimal::from(10),
                discount_type: DiscountType::Percentage,
                is_used: true,
            }),
            loyalty_discount: None,
        };
        let summary = DiscountSummary::new(USER, &records, 7, &LoyaltyTiers::standard());

        assert!(!summary.has_signup_discount);
        assert_eq!(summary.signup_discount_used, Some(true));
        assert!(!summary.has_loyalty_discount);
        assert_eq!(summary.next_loyalty_tier.map(|t| t.threshold), Some(10));
    }
}
