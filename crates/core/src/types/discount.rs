//! Discount records and the per-checkout discount bundle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{PromotionId, UserId};
use super::status::DiscountType;

/// One-time discount granted to a user at registration.
///
/// `is_used` is a permanent consumption flag: once true it never goes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SignupDiscount {
    pub user_id: UserId,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub is_used: bool,
}

/// Recurring discount tier unlocked by completed reservations.
///
/// `is_used` is a reversible hold: while true the discount is skipped at
/// checkout. Tier recomputation never changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyDiscount {
    pub user_id: UserId,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    /// Completed-reservation count of the tier this discount belongs to.
    pub threshold: i32,
    pub is_used: bool,
}

/// Admin-defined, optionally time-bounded discount independent of any user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub title: String,
    pub description: Option<String>,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Why a selected promotion was left out of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromotionRejection {
    /// No promotion with the selected ID exists.
    NotFound,
    /// The promotion has been switched off.
    Inactive,
    /// `start_date` is still in the future.
    NotStarted,
    /// `end_date` has passed.
    Expired,
}

impl std::fmt::Display for PromotionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "promotion not found"),
            Self::Inactive => write!(f, "promotion is not active"),
            Self::NotStarted => write!(f, "promotion has not started yet"),
            Self::Expired => write!(f, "promotion has expired"),
        }
    }
}

impl Promotion {
    /// Check whether the promotion may be applied at `now`.
    ///
    /// Both window bounds are inclusive; an unset bound is open.
    ///
    /// # Errors
    ///
    /// Returns the first failed condition, checked in the order
    /// active flag, start date, end date.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
        if !self.is_active {
            return Err(PromotionRejection::Inactive);
        }
        if self.start_date.is_some_and(|start| start > now) {
            return Err(PromotionRejection::NotStarted);
        }
        if self.end_date.is_some_and(|end| end < now) {
            return Err(PromotionRejection::Expired);
        }
        Ok(())
    }

    /// Whether the promotion may be applied at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.check_usable(now).is_ok()
    }
}

/// Candidate discounts gathered for one checkout, before stacking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountBundle {
    pub signup_discount: Option<SignupDiscount>,
    pub loyalty_discount: Option<LoyaltyDiscount>,
    pub promotion: Option<Promotion>,
}

impl DiscountBundle {
    /// A bundle with no candidate discounts.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}
