//! Domain models for the marketplace service.
//!
//! Discount records shared with pricing live in `qreserve_core`; the types
//! here describe what the marketplace persists around a checkout.

pub mod discount;
pub mod reservation;

pub use discount::{NewPromotion, UserDiscounts};
pub use reservation::{
    CompletionOutcome, NewReservation, NewReservationItem, Reservation, ReservationItem, items_total,
};
