//! Promotion routes.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use qreserve_core::Promotion;

use super::json_body;
use crate::error::{AppError, Result};
use crate::models::NewPromotion;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// List promotions, optionally only those usable right now.
///
/// GET /api/promotions?activeOnly=true
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Promotion>>> {
    let active_at = query.active_only.then(Utc::now);
    let promotions = state.discounts().list_promotions(active_at).await?;
    Ok(Json(promotions))
}

/// Create a promotion.
///
/// POST /api/promotions
#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewPromotion>, JsonRejection>,
) -> Result<(StatusCode, Json<Promotion>)> {
    let promotion = json_body(payload)?;
    promotion.validate().map_err(AppError::BadRequest)?;

    let created = state.discounts().create_promotion(promotion).await?;
    info!(id = %created.id, title = %created.title, "Promotion created");
    Ok((StatusCode::CREATED, Json(created)))
}
