//! Business logic services for the marketplace.
//!
//! # Services
//!
//! - `discounts` - Discount lookup, promotion validation and manual toggles
//! - `consumption` - Claiming and marking single-use discounts
//! - `loyalty` - Loyalty tier recomputation after completion
//! - `checkout` - Quote and checkout orchestration
//!
//! Services borrow their repositories for the duration of a request.

pub mod checkout;
pub mod consumption;
pub mod discounts;
pub mod loyalty;

pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutRequest, CheckoutService, Quote};
pub use consumption::{ClaimOutcome, ConsumptionError, ConsumptionManager};
pub use discounts::{
    DiscountError, DiscountKind, DiscountService, DiscountSummary, GatheredBundle,
};
pub use loyalty::{LoyaltyError, LoyaltyTierEvaluator, TierChange, TierEvaluation};
