//! Loyalty tier table keyed by completed-reservation count.
//!
//! Tiers are scanned in table order. The scan keeps the last tier whose
//! threshold the count meets and stops at the first tier it misses, so a
//! count can never skip past an unmet tier even if the table is not sorted.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DiscountType, LoyaltyDiscount, UserId};

/// Errors building a tier table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierTableError {
    /// A `threshold:percent` pair could not be parsed.
    #[error("invalid tier entry '{0}': expected <threshold>:<percent>")]
    Malformed(String),

    /// A threshold is zero or negative.
    #[error("tier threshold must be positive, got {0}")]
    InvalidThreshold(i32),

    /// A tier discount is negative or above 100%.
    #[error("tier discount out of range: {0}")]
    InvalidDiscount(Decimal),
}

/// A single loyalty tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyTier {
    /// Completed reservations needed to reach this tier.
    pub threshold: i32,
    pub discount: Decimal,
    pub discount_type: DiscountType,
}

impl LoyaltyTier {
    /// A percentage tier.
    #[must_use]
    pub const fn percentage(threshold: i32, percent: Decimal) -> Self {
        Self {
            threshold,
            discount: percent,
            discount_type: DiscountType::Percentage,
        }
    }

    /// Whether `count` completed reservations meet this tier.
    #[must_use]
    pub fn is_met_by(&self, count: i64) -> bool {
        i64::from(self.threshold) <= count
    }

    /// Whether a persisted loyalty discount already reflects this tier.
    #[must_use]
    pub fn matches(&self, discount: &LoyaltyDiscount) -> bool {
        discount.discount == self.discount
            && discount.discount_type == self.discount_type
            && discount.threshold == self.threshold
    }

    /// A fresh loyalty discount record for `user_id` at this tier.
    #[must_use]
    pub const fn to_discount(&self, user_id: UserId) -> LoyaltyDiscount {
        LoyaltyDiscount {
            user_id,
            discount: self.discount,
            discount_type: self.discount_type,
            threshold: self.threshold,
            is_used: false,
        }
    }
}

/// Ordered loyalty tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoyaltyTiers(Vec<LoyaltyTier>);

impl LoyaltyTiers {
    /// Build a tier table, validating every tier.
    ///
    /// # Errors
    ///
    /// Returns an error if a threshold is not positive or a discount is negative
    /// (or above 100 for percentage tiers).
    pub fn new(tiers: Vec<LoyaltyTier>) -> Result<Self, TierTableError> {
        for tier in &tiers {
            if tier.threshold <= 0 {
                return Err(TierTableError::InvalidThreshold(tier.threshold));
            }
            let over_cap =
                tier.discount_type == DiscountType::Percentage && tier.discount > Decimal::ONE_HUNDRED;
            if tier.discount.is_sign_negative() || over_cap {
                return Err(TierTableError::InvalidDiscount(tier.discount));
            }
        }
        Ok(Self(tiers))
    }

    /// The standard marketplace tiers: 5 → 5%, 10 → 10%, 20 → 15%.
    #[must_use]
    pub fn standard() -> Self {
        Self(vec![
            LoyaltyTier::percentage(5, Decimal::from(5)),
            LoyaltyTier::percentage(10, Decimal::from(10)),
            LoyaltyTier::percentage(20, Decimal::from(15)),
        ])
    }

    /// Tiers in scan order.
    #[must_use]
    pub fn tiers(&self) -> &[LoyaltyTier] {
        &self.0
    }

    /// The tier `completed` reservations qualify for, if any.
    #[must_use]
    pub fn qualifying_tier(&self, completed: i64) -> Option<&LoyaltyTier> {
        let mut reached = None;
        for tier in &self.0 {
            if !tier.is_met_by(completed) {
                break;
            }
            reached = Some(tier);
        }
        reached
    }

    /// The tier that stopped the scan, i.e. the next one to unlock.
    #[must_use]
    pub fn next_tier(&self, completed: i64) -> Option<&LoyaltyTier> {
        self.0.iter().find(|tier| !tier.is_met_by(completed))
    }
}

impl Default for LoyaltyTiers {
    fn default() -> Self {
        Self::standard()
    }
}

impl FromStr for LoyaltyTiers {
    type Err = TierTableError;

    /// Parse `"5:5,10:10,20:15"` (threshold:percent pairs).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tiers = s
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (threshold, percent) = entry
                    .split_once(':')
                    .ok_or_else(|| TierTableError::Malformed(entry.to_string()))?;
                let threshold = threshold
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| TierTableError::Malformed(entry.to_string()))?;
                let percent = percent
                    .trim()
                    .parse::<Decimal>()
                    .map_err(|_| TierTableError::Malformed(entry.to_string()))?;
                Ok(LoyaltyTier::percentage(threshold, percent))
            })
            .collect::<Result<Vec<_>, TierTableError>>()?;

        Self::new(tiers)
    }
}
