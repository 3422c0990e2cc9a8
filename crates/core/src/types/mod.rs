//! Core types for QReserve.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod discount;
pub mod id;
pub mod money;
pub mod status;

pub use discount::{DiscountBundle, LoyaltyDiscount, Promotion, PromotionRejection, SignupDiscount};
pub use id::*;
pub use money::{MAX_MONEY, MONEY_DECIMAL_PLACES, is_storable_money, round_money};
pub use status::*;
