//! Per-user discount routes.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::instrument;

use qreserve_core::{SignupDiscount, UserId};

use super::json_body;
use crate::error::Result;
use crate::services::{DiscountKind, DiscountService, DiscountSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUsedRequest {
    pub user_id: UserId,
    pub discount_type: DiscountKind,
    pub is_used: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantSignupRequest {
    pub user_id: UserId,
}

async fn load_summary(state: &AppState, user_id: UserId) -> Result<DiscountSummary> {
    let records = state.discounts().find_user_discounts(user_id).await?;
    let completed = state.reservations().count_completed(user_id).await?;
    Ok(DiscountSummary::new(
        user_id,
        &records,
        completed,
        &state.config().loyalty_tiers,
    ))
}

/// Discount state for a user.
///
/// GET /api/discounts?userId=
#[instrument(skip(state), fields(user_id = %query.user_id))]
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DiscountSummary>> {
    Ok(Json(load_summary(&state, query.user_id).await?))
}

/// Manually set a discount's `isUsed` flag.
///
/// PUT /api/discounts
#[instrument(skip(state, payload))]
pub async fn set_used(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SetUsedRequest>, JsonRejection>,
) -> Result<Json<DiscountSummary>> {
    let body = json_body(payload)?;
    DiscountService::new(state.discounts())
        .set_used(body.user_id, body.discount_type, body.is_used)
        .await?;
    Ok(Json(load_summary(&state, body.user_id).await?))
}

/// Grant the configured signup discount to a newly registered user.
///
/// POST /api/discounts/signup
#[instrument(skip(state, payload))]
pub async fn grant_signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GrantSignupRequest>, JsonRejection>,
) -> Result<Json<SignupDiscount>> {
    let body = json_body(payload)?;
    let signup = state.config().signup_discount;
    let record = DiscountService::new(state.discounts())
        .grant_signup(body.user_id, signup.discount, signup.discount_type)
        .await?;
    Ok(Json(record))
}
