//! Reservation lookup and completion routes.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, instrument};

use qreserve_core::{LoyaltyDiscount, ReservationId, UserId};

use crate::error::{AppError, Result};
use crate::models::{CompletionOutcome, Reservation};
use crate::services::{LoyaltyTierEvaluator, TierChange};
use crate::state::AppState;

/// What happened to the user's loyalty discount after completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoyaltyOutcome {
    Created,
    Updated,
    Unchanged,
    NotEligible,
    /// The tier could not be recomputed; the completion still stands.
    Failed,
}

impl From<TierChange> for LoyaltyOutcome {
    fn from(change: TierChange) -> Self {
        match change {
            TierChange::Created => Self::Created,
            TierChange::Updated => Self::Updated,
            TierChange::Unchanged => Self::Unchanged,
            TierChange::NotEligible => Self::NotEligible,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyReport {
    pub outcome: LoyaltyOutcome,
    pub completed_reservations: Option<i64>,
    pub discount: Option<LoyaltyDiscount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub reservation: Reservation,
    pub already_completed: bool,
    /// Absent when the reservation was already completed.
    pub loyalty: Option<LoyaltyReport>,
}

/// Reservation detail.
///
/// GET /api/reservations/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> Result<Json<Reservation>> {
    state
        .reservations()
        .find_reservation(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("reservation {id}")))
}

/// A user's reservations, newest first.
///
/// GET /api/reservations/user/{userId}
#[instrument(skip(state))]
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Reservation>>> {
    Ok(Json(state.reservations().list_for_user(user_id).await?))
}

/// Mark a reservation completed and recompute the user's loyalty tier.
///
/// POST /api/reservations/{id}/complete
///
/// A failed tier recomputation is reported in the response and does not undo
/// the completion.
#[instrument(skip(state))]
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> Result<Json<CompletionResponse>> {
    let reservation = match state
        .reservations()
        .complete_reservation(id, Utc::now())
        .await?
    {
        CompletionOutcome::Completed(reservation) => reservation,
        CompletionOutcome::AlreadyCompleted(reservation) => {
            return Ok(Json(CompletionResponse {
                reservation,
                already_completed: true,
                loyalty: None,
            }));
        }
        CompletionOutcome::NotCompletable(status) => {
            return Err(AppError::Conflict(format!(
                "reservation {id} is {status} and cannot be completed"
            )));
        }
        CompletionOutcome::NotFound => {
            return Err(AppError::NotFound(format!("reservation {id}")));
        }
    };

    let tiers = &state.config().loyalty_tiers;
    let evaluator = LoyaltyTierEvaluator::new(state.discounts(), state.reservations(), tiers);
    let loyalty = match evaluator.evaluate(reservation.user_id).await {
        Ok(evaluation) => LoyaltyReport {
            outcome: evaluation.change.into(),
            completed_reservations: Some(evaluation.completed_reservations),
            discount: evaluation.discount,
        },
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(
                user_id = %reservation.user_id,
                error = %e,
                sentry_event_id = %event_id,
                "Loyalty tier update failed"
            );
            LoyaltyReport {
                outcome: LoyaltyOutcome::Failed,
                completed_reservations: None,
                discount: None,
            }
        }
    };

    Ok(Json(CompletionResponse {
        reservation,
        already_completed: false,
        loyalty: Some(loyalty),
    }))
}
