//! Quote and checkout routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use qreserve_core::{PromotionId, UserId};

use super::json_body;
use crate::error::{Result, add_breadcrumb};
use crate::models::NewReservationItem;
use crate::services::{CheckoutReceipt, CheckoutRequest, CheckoutService, Quote};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub user_id: UserId,
    pub reservation_items: Vec<NewReservationItem>,
    #[serde(default)]
    pub applied_promotion_id: Option<PromotionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub user_id: UserId,
    pub reservation_items: Vec<NewReservationItem>,
    #[serde(default)]
    pub applied_promotion_id: Option<PromotionId>,
    /// Total shown to the user; checked against the computed total.
    #[serde(default)]
    pub total_price: Option<Decimal>,
}

fn checkout_service(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(
        state.discounts(),
        state.reservations(),
        state.config().max_claim_attempts,
    )
}

/// Price preview for a set of items.
///
/// POST /api/checkout/quote
#[instrument(skip(state, payload))]
pub async fn quote(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Quote>> {
    let body = json_body(payload)?;
    let quote = checkout_service(&state)
        .quote(
            body.user_id,
            &body.reservation_items,
            body.applied_promotion_id,
            Utc::now(),
        )
        .await?;
    Ok(Json(quote))
}

/// Check out and create a reservation.
///
/// POST /api/reservations
#[instrument(skip(state, payload))]
pub async fn create_reservation(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let body = json_body(payload)?;
    add_breadcrumb("checkout", "Reservation checkout started");

    let request = CheckoutRequest {
        user_id: body.user_id,
        items: body.reservation_items,
        promotion_id: body.applied_promotion_id,
        expected_total: body.total_price,
    };
    let receipt = checkout_service(&state).checkout(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
