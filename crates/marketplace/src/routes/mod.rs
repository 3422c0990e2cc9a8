//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                             - Liveness check
//! GET  /health/ready                       - Readiness check (database)
//!
//! # Discounts
//! GET  /api/discounts?userId=              - Discount summary for a user
//! PUT  /api/discounts                      - Set a discount's isUsed flag
//! POST /api/discounts/signup               - Grant the signup discount
//!
//! # Promotions
//! GET  /api/promotions?activeOnly=         - List promotions
//! POST /api/promotions                     - Create a promotion
//!
//! # Checkout
//! POST /api/checkout/quote                 - Price preview, no side effects
//! POST /api/reservations                   - Checkout and create a reservation
//!
//! # Reservations
//! GET  /api/reservations/{id}              - Reservation detail
//! GET  /api/reservations/user/{userId}     - A user's reservations
//! POST /api/reservations/{id}/complete     - Mark completed, recompute loyalty tier
//! ```

pub mod checkout;
pub mod discounts;
pub mod promotions;
pub mod reservations;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// Create the discount routes.
pub fn discount_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/discounts",
            get(discounts::summary).put(discounts::set_used),
        )
        .route("/api/discounts/signup", post(discounts::grant_signup))
}

/// Create the promotion routes.
pub fn promotion_routes() -> Router<AppState> {
    Router::new().route(
        "/api/promotions",
        get(promotions::list).post(promotions::create),
    )
}

/// Create the checkout and reservation routes.
pub fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/checkout/quote", post(checkout::quote))
        .route("/api/reservations", post(checkout::create_reservation))
        .route("/api/reservations/{id}", get(reservations::show))
        .route(
            "/api/reservations/user/{user_id}",
            get(reservations::list_for_user),
        )
        .route("/api/reservations/{id}/complete", post(reservations::complete))
}

/// Create all API routes for the marketplace.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(discount_routes())
        .merge(promotion_routes())
        .merge(reservation_routes())
}

/// Unwrap a JSON body, turning extractor rejections into 400 responses.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
