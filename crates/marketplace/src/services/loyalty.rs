//! Loyalty tier recomputation.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use qreserve_core::{LoyaltyDiscount, LoyaltyTiers, UserId};

use crate::db::{DiscountRepository, RepositoryError, ReservationRepository};

/// Errors from loyalty evaluation.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a tier evaluation did to the stored loyalty discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TierChange {
    Created,
    Updated,
    Unchanged,
    NotEligible,
}

/// Outcome of evaluating one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierEvaluation {
    pub completed_reservations: i64,
    pub change: TierChange,
    /// The stored discount for the qualifying tier.
    pub discount: Option<LoyaltyDiscount>,
}

/// Recomputes a user's loyalty tier from their completed reservations.
pub struct LoyaltyTierEvaluator<'a> {
    discounts: &'a dyn DiscountRepository,
    reservations: &'a dyn ReservationRepository,
    tiers: &'a LoyaltyTiers,
}

impl<'a> LoyaltyTierEvaluator<'a> {
    #[must_use]
    pub const fn new(
        discounts: &'a dyn DiscountRepository,
        reservations: &'a dyn ReservationRepository,
        tiers: &'a LoyaltyTiers,
    ) -> Self {
        Self {
            discounts,
            reservations,
            tiers,
        }
    }

    /// Evaluate the user's tier and persist it if it changed.
    ///
    /// A stored discount whose value, type and threshold already match the
    /// qualifying tier is left untouched. Writes never change `is_used`.
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::Repository` if a read or write fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn evaluate(&self, user_id: UserId) -> Result<TierEvaluation, LoyaltyError> {
        let completed = self.reservations.count_completed(user_id).await?;

        let Some(tier) = self.tiers.qualifying_tier(completed) else {
            return Ok(TierEvaluation {
                completed_reservations: completed,
                change: TierChange::NotEligible,
                discount: None,
            });
        };

        let existing = self
            .discounts
            .find_user_discounts(user_id)
            .await?
            .loyalty_discount;

        let (change, discount) = match existing {
            Some(current) if tier.matches(&current) => (TierChange::Unchanged, current),
            Some(_) => {
                let stored = self
                    .discounts
                    .upsert_loyalty_tier(tier.to_discount(user_id))
                    .await?;
                (TierChange::Updated, stored)
            }
            None => {
                let stored = self
                    .discounts
                    .upsert_loyalty_tier(tier.to_discount(user_id))
                    .await?;
                (TierChange::Created, stored)
            }
        };

        if change != TierChange::Unchanged {
            info!(
                completed,
                threshold = discount.threshold,
                discount = %discount.discount,
                ?change,
                "Loyalty tier updated"
            );
        }

        Ok(TierEvaluation {
            completed_reservations: completed,
            change,
            discount: Some(discount),
        })
    }

    /// The user's loyalty discount after evaluation, if they qualify.
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::Repository` if a read or write fails.
    pub async fn evaluate_tier(
        &self,
        user_id: UserId,
    ) -> Result<Option<LoyaltyDiscount>, LoyaltyError> {
        Ok(self.evaluate(user_id).await?.discount)
    }
}
