//! Pricing rules for reservation checkout.
//!
//! - [`calculator`] stacks signup, loyalty and promotion discounts against an
//!   original price.
//! - [`tiers`] maps a completed-reservation count to a loyalty discount tier.

pub mod calculator;
pub mod tiers;

pub use calculator::{
    AppliedDiscount, LOYALTY_DESCRIPTION, PriceResult, PricingError, SIGNUP_DESCRIPTION,
    compute_price, discount_amount,
};
pub use tiers::{LoyaltyTier, LoyaltyTiers, TierTableError};
