//! Discount-related models owned by the marketplace.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use qreserve_core::{DiscountType, LoyaltyDiscount, SignupDiscount, is_storable_money};

/// The per-user discount records, as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDiscounts {
    pub signup_discount: Option<SignupDiscount>,
    pub loyalty_discount: Option<LoyaltyDiscount>,
}

/// Parameters for creating a promotion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromotion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl NewPromotion {
    /// Check the promotion is well-formed.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.discount <= Decimal::ZERO {
            return Err("discount must be greater than zero".to_string());
        }
        if !is_storable_money(self.discount) {
            return Err("discount must have at most two decimal places".to_string());
        }
        if self.discount_type == DiscountType::Percentage && self.discount > Decimal::ONE_HUNDRED {
            return Err("percentage discount must be at most 100".to_string());
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err("startDate must not be after endDate".to_string());
        }
        Ok(())
    }
}
