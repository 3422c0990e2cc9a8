//! Loyalty maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! qr-cli loyalty recompute --user-id 42
//! ```
//!
//! Uses the tier table from `LOYALTY_TIERS` (default `5:5,10:10,20:15`).
//! Any `is_used` hold on the user's loyalty discount is kept.

use qreserve_core::{LoyaltyTiers, TierTableError, UserId};
use qreserve_marketplace::db::{self, PgDiscountRepository, PgReservationRepository};
use qreserve_marketplace::services::{LoyaltyError, LoyaltyTierEvaluator};

use super::migrate::{MigrationError, database_url};

/// Errors from loyalty commands.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyCommandError {
    #[error(transparent)]
    Setup(#[from] MigrationError),

    #[error("Invalid LOYALTY_TIERS: {0}")]
    Tiers(#[from] TierTableError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

fn tiers_from_env() -> Result<LoyaltyTiers, TierTableError> {
    std::env::var("LOYALTY_TIERS").map_or_else(|_| Ok(LoyaltyTiers::standard()), |v| v.parse())
}

/// Recompute and persist the loyalty tier for one user.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a database call fails.
pub async fn recompute(user_id: i32) -> Result<(), LoyaltyCommandError> {
    let database_url = database_url()?;
    let tiers = tiers_from_env()?;

    let pool = db::create_pool(&database_url).await?;
    let discounts = PgDiscountRepository::new(pool.clone());
    let reservations = PgReservationRepository::new(pool);

    let evaluation = LoyaltyTierEvaluator::new(&discounts, &reservations, &tiers)
        .evaluate(UserId::new(user_id))
        .await?;

    match evaluation.discount {
        Some(discount) => tracing::info!(
            user_id,
            completed = evaluation.completed_reservations,
            change = ?evaluation.change,
            threshold = discount.threshold,
            discount = %discount.discount,
            is_used = discount.is_used,
            "Loyalty tier recomputed"
        ),
        None => tracing::info!(
            user_id,
            completed = evaluation.completed_reservations,
            "User does not qualify for a loyalty tier"
        ),
    }
    Ok(())
}
