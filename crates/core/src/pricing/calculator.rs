//! Discount stacking calculator.
//!
//! Stacking order is fixed: signup, then loyalty, then promotion. Every
//! eligible discount is computed against the *original* price, never against
//! a running discounted value, and the amounts are subtracted once. The final
//! price is floored at zero.
//!
//! ```rust
//! use qreserve_core::{DiscountBundle, DiscountType, SignupDiscount, UserId, compute_price};
//! use rust_decimal::Decimal;
//!
//! let bundle = DiscountBundle {
//!     signup_discount: Some(SignupDiscount {
//!         user_id: UserId::new(1),
//!         discount: Decimal::from(10),
//!         discount_type: DiscountType::Percentage,
//!         is_used: false,
//!     }),
//!     ..DiscountBundle::empty()
//! };
//!
//! let result = compute_price(Decimal::from(200), &bundle).unwrap();
//! assert_eq!(result.final_price, Decimal::from(180));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DiscountBundle, DiscountSource, DiscountType, round_money};

/// Receipt line for the signup discount.
pub const SIGNUP_DESCRIPTION: &str = "New user discount";

/// Receipt line for the loyalty discount.
pub const LOYALTY_DESCRIPTION: &str = "Loyalty discount";

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Errors raised before any price is computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The original price is below zero.
    #[error("original price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    /// A discount in the bundle has an impossible value.
    #[error("invalid {kind} discount: {reason}")]
    InvalidDiscount {
        /// Which bundle entry is malformed.
        kind: DiscountSource,
        /// What is wrong with it.
        reason: String,
    },

    /// An intermediate amount does not fit in a decimal.
    #[error("amount out of range while pricing")]
    Overflow,
}

/// One discount that contributed to a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    #[serde(rename = "type")]
    pub source: DiscountSource,
    pub amount: Decimal,
    pub description: String,
}

/// Outcome of stacking a discount bundle onto an original price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResult {
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub total_discount: Decimal,
    /// Contributors in stacking order.
    pub applied_discounts: Vec<AppliedDiscount>,
}

impl PriceResult {
    /// Whether a discount from `source` contributed to this price.
    #[must_use]
    pub fn applies(&self, source: DiscountSource) -> bool {
        self.applied_discounts.iter().any(|d| d.source == source)
    }

    /// Distinct sources that contributed, in stacking order.
    #[must_use]
    pub fn sources(&self) -> Vec<DiscountSource> {
        let mut sources: Vec<DiscountSource> =
            self.applied_discounts.iter().map(|d| d.source).collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }
}

/// Amount a single discount takes off `original_price`, rounded to cents.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] when the percentage product does not
/// fit in a decimal.
pub fn discount_amount(
    original_price: Decimal,
    discount: Decimal,
    discount_type: DiscountType,
) -> Result<Decimal, PricingError> {
    match discount_type {
        DiscountType::Percentage => original_price
            .checked_mul(discount)
            .and_then(|product| product.checked_div(ONE_HUNDRED))
            .map(round_money)
            .ok_or(PricingError::Overflow),
        DiscountType::Fixed => Ok(round_money(discount)),
    }
}

/// Stack the eligible discounts of `bundle` onto `original_price`.
///
/// Eligibility:
/// - signup: present and not yet used
/// - loyalty: present and not on hold
/// - promotion: present (the caller has already validated it)
///
/// # Errors
///
/// Returns [`PricingError::NegativePrice`] for a negative original price and
/// [`PricingError::InvalidDiscount`] when any discount in the bundle is
/// negative or a percentage exceeds 100. [`PricingError::Overflow`] when the
/// amounts leave the decimal range.
pub fn compute_price(
    original_price: Decimal,
    bundle: &DiscountBundle,
) -> Result<PriceResult, PricingError> {
    if original_price.is_sign_negative() && !original_price.is_zero() {
        return Err(PricingError::NegativePrice(original_price));
    }
    validate_bundle(bundle)?;

    let mut applied = Vec::with_capacity(3);

    if let Some(signup) = bundle.signup_discount.as_ref().filter(|s| !s.is_used) {
        applied.push(AppliedDiscount {
            source: DiscountSource::Signup,
            amount: discount_amount(original_price, signup.discount, signup.discount_type)?,
            description: SIGNUP_DESCRIPTION.to_string(),
        });
    }

    if let Some(loyalty) = bundle.loyalty_discount.as_ref().filter(|l| !l.is_used) {
        applied.push(AppliedDiscount {
            source: DiscountSource::Loyalty,
            amount: discount_amount(original_price, loyalty.discount, loyalty.discount_type)?,
            description: LOYALTY_DESCRIPTION.to_string(),
        });
    }

    if let Some(promotion) = &bundle.promotion {
        applied.push(AppliedDiscount {
            source: DiscountSource::Promotion,
            amount: discount_amount(original_price, promotion.discount, promotion.discount_type)?,
            description: promotion.title.clone(),
        });
    }

    let stacked = applied
        .iter()
        .try_fold(Decimal::ZERO, |sum, d| sum.checked_add(d.amount))
        .ok_or(PricingError::Overflow)?;
    let final_price = (original_price - stacked).max(Decimal::ZERO);

    Ok(PriceResult {
        original_price,
        final_price,
        total_discount: original_price - final_price,
        applied_discounts: applied,
    })
}

fn validate_bundle(bundle: &DiscountBundle) -> Result<(), PricingError> {
    if let Some(signup) = &bundle.signup_discount {
        validate_value(DiscountSource::Signup, signup.discount, signup.discount_type)?;
    }
    if let Some(loyalty) = &bundle.loyalty_discount {
        validate_value(DiscountSource::Loyalty, loyalty.discount, loyalty.discount_type)?;
    }
    if let Some(promotion) = &bundle.promotion {
        validate_value(
            DiscountSource::Promotion,
            promotion.discount,
            promotion.discount_type,
        )?;
    }
    Ok(())
}

fn validate_value(
    kind: DiscountSource,
    value: Decimal,
    discount_type: DiscountType,
) -> Result<(), PricingError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PricingError::InvalidDiscount {
            kind,
            reason: format!("value must be non-negative, got {value}"),
        });
    }
    if discount_type == DiscountType::Percentage && value > ONE_HUNDRED {
        return Err(PricingError::InvalidDiscount {
            kind,
            reason: format!("percentage must be at most 100, got {value}"),
        });
    }
    Ok(())
}
