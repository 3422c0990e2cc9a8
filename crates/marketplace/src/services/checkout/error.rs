//! Checkout error types.

use rust_decimal::Decimal;
use thiserror::Error;

use qreserve_core::PricingError;

use crate::db::RepositoryError;
use crate::services::consumption::ConsumptionError;

/// Errors that can occur while quoting or checking out.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No line items were submitted.
    #[error("reservation must contain at least one item")]
    EmptyReservation,

    /// A line item failed validation.
    #[error("invalid reservation item: {0}")]
    InvalidItem(String),

    /// The price or a discount was invalid.
    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// The signup discount kept being consumed by concurrent checkouts.
    #[error("signup discount claim conflicted {attempts} times")]
    ClaimConflict { attempts: u32 },

    /// The client's expected total no longer matches the computed total.
    #[error("price changed: expected {expected}, computed {computed}")]
    PriceMismatch { expected: Decimal, computed: Decimal },

    /// The reservation could not be written. Any claim was released.
    #[error("failed to persist reservation: {0}")]
    Persistence(#[source] RepositoryError),

    /// Claiming or releasing a discount failed.
    #[error("discount consumption error: {0}")]
    Consumption(#[from] ConsumptionError),

    /// Repository/database error while reading checkout inputs.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
