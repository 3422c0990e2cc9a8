//! QReserve Core - Shared types and pricing rules.
//!
//! This crate provides the domain types and the pure pricing logic used by:
//! - `marketplace` - Reservation checkout and discount HTTP service
//! - `cli` - Command-line tools for migrations and loyalty maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Prices computed here are deterministic for a given
//! input, which keeps checkout logic testable without storage.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money helpers, discount records and statuses
//! - [`pricing`] - Discount stacking calculator and loyalty tier table

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::*;
pub use types::*;
