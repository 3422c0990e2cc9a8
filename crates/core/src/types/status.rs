//! Status and kind enums shared by pricing, storage and the HTTP layer.

use serde::{Deserialize, Serialize};

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(
        type_name = "marketplace.discount_type",
        rename_all = "SCREAMING_SNAKE_CASE"
    )
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `discount` is a percentage of the original price (0-100).
    #[default]
    Percentage,
    /// `discount` is a flat amount in the marketplace currency.
    Fixed,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentage => write!(f, "PERCENTAGE"),
            Self::Fixed => write!(f, "FIXED"),
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERCENTAGE" => Ok(Self::Percentage),
            "FIXED" => Ok(Self::Fixed),
            _ => Err(format!("invalid discount type: {s}")),
        }
    }
}

/// Which discount source contributed an applied discount.
///
/// Variant order is the stacking order used by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountSource {
    /// One-time new user discount.
    Signup,
    /// Tier discount unlocked by completed reservations.
    Loyalty,
    /// Admin-defined promotion selected at checkout.
    Promotion,
}

impl std::fmt::Display for DiscountSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "SIGNUP"),
            Self::Loyalty => write!(f, "LOYALTY"),
            Self::Promotion => write!(f, "PROMOTION"),
        }
    }
}

/// Lifecycle of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.reservation_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Created but not yet paid.
    Pending,
    /// Paid at checkout.
    #[default]
    Confirmed,
    /// The reserved service took place.
    Completed,
    /// Cancelled by the user or an admin.
    Cancelled,
}

impl ReservationStatus {
    /// Whether a reservation in this status may transition to `Completed`.
    #[must_use]
    pub const fn can_complete(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&DiscountType::Percentage).ok().as_deref(),
            Some("\"PERCENTAGE\"")
        );
        assert_eq!(
            serde_json::from_str::<DiscountType>("\"FIXED\"").ok(),
            Some(DiscountType::Fixed)
        );
    }

    #[test]
    fn test_discount_type_from_str() {
        assert_eq!("percentage".parse::<DiscountType>(), Ok(DiscountType::Percentage));
        assert_eq!(" FIXED ".parse::<DiscountType>(), Ok(DiscountType::Fixed));
        assert!("bogus".parse::<DiscountType>().is_err());
    }

    #[test]
    fn test_source_order_matches_stacking() {
        assert!(DiscountSource::Signup < DiscountSource::Loyalty);
        assert!(DiscountSource::Loyalty < DiscountSource::Promotion);
    }

    #[test]
    fn test_only_open_reservations_complete() {
        assert!(ReservationStatus::Confirmed.can_complete());
        assert!(ReservationStatus::Pending.can_complete());
        assert!(!ReservationStatus::Completed.can_complete());
        assert!(!ReservationStatus::Cancelled.can_complete());
    }
}
