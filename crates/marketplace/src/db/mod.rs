//! Database operations for the marketplace `PostgreSQL` schema.
//!
//! # Schema: `marketplace`
//!
//! ## Tables
//!
//! - `signup_discount` - One-time registration discount per user
//! - `loyalty_discount` - Current loyalty tier per user
//! - `promotion` - Marketplace-wide promotions
//! - `reservation` / `reservation_item` - Checked-out reservations
//! - `completed_reservation` - Completion log counted by loyalty tiers
//!
//! Users live in the accounts service; `user_id` columns carry no foreign key.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/marketplace/migrations/` and run via:
//! ```bash
//! cargo run -p qreserve-cli -- migrate
//! ```
//!
//! Storage sits behind [`DiscountRepository`] and [`ReservationRepository`] so
//! the checkout services run unchanged against [`memory::InMemoryStore`].

mod discounts;
pub mod memory;
mod reservations;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use qreserve_core::{
    DiscountType, LoyaltyDiscount, Promotion, PromotionId, ReservationId, SignupDiscount, UserId,
};

use crate::models::{CompletionOutcome, NewPromotion, NewReservation, Reservation, UserDiscounts};

pub use discounts::PgDiscountRepository;
pub use memory::InMemoryStore;
pub use reservations::PgReservationRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate signup discount).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage for per-user discounts and promotions.
///
/// The signup claim and release methods are compare-and-set operations: they
/// only flip `is_used` when it currently holds the opposite value and report
/// whether they did.
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// Both per-user discount records.
    async fn find_user_discounts(&self, user_id: UserId) -> Result<UserDiscounts, RepositoryError>;

    /// A promotion by id, regardless of whether it is currently usable.
    async fn find_promotion(&self, id: PromotionId) -> Result<Option<Promotion>, RepositoryError>;

    /// Promotions ordered by id, optionally restricted to those usable at `now`.
    async fn list_promotions(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Promotion>, RepositoryError>;

    async fn create_promotion(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError>;

    /// Grant the signup discount. Returns the existing record unchanged if the
    /// user already has one.
    async fn grant_signup_discount(
        &self,
        user_id: UserId,
        discount: Decimal,
        discount_type: DiscountType,
    ) -> Result<SignupDiscount, RepositoryError>;

    /// Set signup `is_used` from false to true. `false` means there was no
    /// unused signup discount to claim.
    async fn claim_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Undo a claim by setting `is_used` from true back to false.
    async fn release_signup_discount(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Set the loyalty hold flag. Returns the updated record if one exists.
    async fn set_loyalty_used(
        &self,
        user_id: UserId,
        is_used: bool,
    ) -> Result<Option<LoyaltyDiscount>, RepositoryError>;

    /// Insert or replace the user's loyalty tier, keeping any existing
    /// `is_used` hold.
    async fn upsert_loyalty_tier(
        &self,
        discount: LoyaltyDiscount,
    ) -> Result<LoyaltyDiscount, RepositoryError>;
}

/// Storage for reservations and the completion log.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, RepositoryError>;

    async fn find_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// A user's reservations, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reservation>, RepositoryError>;

    /// Mark a reservation completed and record it in the completion log.
    async fn complete_reservation(
        &self,
        id: ReservationId,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, RepositoryError>;

    /// How many completed reservations the user has.
    async fn count_completed(&self, user_id: UserId) -> Result<i64, RepositoryError>;
}

/// Map a unique-violation to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}
