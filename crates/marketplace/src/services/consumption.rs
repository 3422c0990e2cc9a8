//! Single-use discount consumption.
//!
//! Signup discounts are claimed with a compare-and-set before the reservation
//! is written, released again if the write fails, and confirmed by
//! [`ConsumptionManager::mark_used`] afterwards. Loyalty discounts are only
//! put on hold by `mark_used`. Promotions are never consumed.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use qreserve_core::{DiscountSource, UserId};

use crate::db::{DiscountRepository, RepositoryError};

/// Errors from consumption operations.
#[derive(Debug, Error)]
pub enum ConsumptionError {
    /// An applied discount has no stored record to update.
    #[error("no {0} discount record to mark used")]
    MissingRecord(DiscountSource),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of claiming single-use discounts for a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Nothing single-use was applied.
    NotRequired,
    /// The signup discount is now held by this checkout.
    Claimed,
    /// Another checkout consumed the signup discount first.
    Conflict,
}

/// Consumption manager.
pub struct ConsumptionManager<'a> {
    discounts: &'a dyn DiscountRepository,
}

impl<'a> ConsumptionManager<'a> {
    #[must_use]
    pub const fn new(discounts: &'a dyn DiscountRepository) -> Self {
        Self { discounts }
    }

    /// Claim the single-use discounts among `applied`.
    ///
    /// # Errors
    ///
    /// Returns `ConsumptionError::Repository` if the update fails.
    #[instrument(skip(self, applied), fields(user_id = %user_id))]
    pub async fn claim_single_use(
        &self,
        user_id: UserId,
        applied: &[DiscountSource],
    ) -> Result<ClaimOutcome, ConsumptionError> {
        if !applied.contains(&DiscountSource::Signup) {
            return Ok(ClaimOutcome::NotRequired);
        }

        if self.discounts.claim_signup_discount(user_id).await? {
            debug!("Signup discount claimed");
            Ok(ClaimOutcome::Claimed)
        } else {
            warn!("Signup discount already consumed by another checkout");
            Ok(ClaimOutcome::Conflict)
        }
    }

    /// Hand back a signup claim after the reservation could not be written.
    ///
    /// # Errors
    ///
    /// Returns `ConsumptionError::Repository` if the update fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn release_claim(&self, user_id: UserId) -> Result<bool, ConsumptionError> {
        let released = self.discounts.release_signup_discount(user_id).await?;
        if !released {
            warn!("No signup claim to release");
        }
        Ok(released)
    }

    /// Record that the discounts in `applied` were spent on a reservation.
    ///
    /// Safe to call more than once: a signup discount that is already used
    /// stays used.
    ///
    /// # Errors
    ///
    /// Returns the first failure; earlier updates are kept.
    #[instrument(skip(self, applied), fields(user_id = %user_id))]
    pub async fn mark_used(
        &self,
        user_id: UserId,
        applied: &[DiscountSource],
    ) -> Result<(), ConsumptionError> {
        let mut sources = applied.to_vec();
        sources.sort_unstable();
        sources.dedup();

        for source in sources {
            match source {
                DiscountSource::Signup => {
                    self.discounts.claim_signup_discount(user_id).await?;
                }
                DiscountSource::Loyalty => {
                    self.discounts
                        .set_loyalty_used(user_id, true)
                        .await?
                        .ok_or(ConsumptionError::MissingRecord(source))?;
                }
                DiscountSource::Promotion => {}
            }
        }
        Ok(())
    }
}
