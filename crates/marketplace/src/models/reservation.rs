//! Reservation models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use qreserve_core::{
    AppliedDiscount, PromotionId, ReservationId, ReservationItemId, ReservationStatus, ServiceId,
    UserId, is_storable_money, round_money,
};

/// A persisted reservation with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub status: ReservationStatus,
    /// Price before discounts.
    pub original_price: Decimal,
    /// Amount actually charged.
    pub total_price: Decimal,
    pub total_discount: Decimal,
    pub applied_promotion_id: Option<PromotionId>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub items: Vec<ReservationItem>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One booked service slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationItem {
    pub id: ReservationItemId,
    pub service_id: ServiceId,
    pub specific_service_id: Option<i32>,
    pub price: Decimal,
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A reservation line item as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservationItem {
    pub service_id: ServiceId,
    #[serde(default)]
    pub specific_service_id: Option<i32>,
    /// Unit price.
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

const fn default_quantity() -> i32 {
    1
}

impl NewReservationItem {
    /// Unit price times quantity, rounded to cents.
    ///
    /// `None` when the product does not fit in a decimal.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price
            .checked_mul(Decimal::from(self.quantity))
            .map(round_money)
    }

    /// Check the item is bookable.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.price.is_sign_negative() {
            return Err(format!("service {}: price must not be negative", self.service_id));
        }
        if !is_storable_money(self.price) {
            return Err(format!(
                "service {}: price must have at most two decimal places and be at most 9999999999.99",
                self.service_id
            ));
        }
        if self.quantity < 1 {
            return Err(format!("service {}: quantity must be at least 1", self.service_id));
        }
        if self.end_time <= self.start_time {
            return Err(format!(
                "service {}: endTime must be after startTime",
                self.service_id
            ));
        }
        Ok(())
    }
}

/// Sum of line totals for a set of items.
///
/// `None` when a line or the sum is too large to store.
#[must_use]
pub fn items_total(items: &[NewReservationItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
        .filter(|total| is_storable_money(*total))
}

/// Everything needed to persist a reservation.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: UserId,
    pub status: ReservationStatus,
    pub original_price: Decimal,
    pub total_price: Decimal,
    pub total_discount: Decimal,
    pub applied_promotion_id: Option<PromotionId>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub items: Vec<NewReservationItem>,
}

/// Result of marking a reservation completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The reservation moved to completed just now.
    Completed(Reservation),
    /// It was already completed; nothing changed.
    AlreadyCompleted(Reservation),
    /// Its status does not allow completion (e.g. cancelled).
    NotCompletable(ReservationStatus),
    NotFound,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn item(price: i64, quantity: i32) -> NewReservationItem {
        let start = Utc::now();
        NewReservationItem {
            service_id: ServiceId::new(3),
            specific_service_id: None,
            price: Decimal::from(price),
            quantity,
            start_time: start,
            end_time: start + Duration::hours(1),
        }
    }

    #[test]
    fn test_line_total_uses_quantity() {
        assert_eq!(item(40, 3).line_total(), Some(Decimal::from(120)));
    }

    #[test]
    fn test_line_total_overflow_is_none() {
        let mut huge = item(0, 2);
        huge.price = Decimal::MAX;
        assert_eq!(huge.line_total(), None);
    }

    #[test]
    fn test_items_total() {
        let items = vec![item(100, 1), item(50, 2)];
        assert_eq!(items_total(&items), Some(Decimal::from(200)));
        assert_eq!(items_total(&[]), Some(Decimal::ZERO));
    }

    #[test]
    fn test_items_total_beyond_money_column_is_none() {
        let mut big = item(0, 1);
        big.price = Decimal::new(999_999_999_999, 2);
        assert!(items_total(&[big.clone()]).is_some());
        assert_eq!(items_total(&[big.clone(), big]), None);
    }

    #[test]
    fn test_sub_cent_price_rejected() {
        let mut priced = item(0, 3);
        priced.price = Decimal::new(10_005, 3);
        assert!(priced.validate().is_err());

        priced.price = Decimal::new(10_500, 3);
        assert!(priced.validate().is_ok());
    }

    #[test]
    fn test_price_above_money_column_rejected() {
        let mut priced = item(0, 1);
        priced.price = Decimal::new(1_000_000_000_000, 2);
        assert!(priced.validate().is_err());

        priced.price = Decimal::MAX;
        assert!(priced.validate().is_err());
    }

    #[test]
    fn test_validate_item() {
        assert!(item(10, 1).validate().is_ok());
        assert!(item(-10, 1).validate().is_err());
        assert!(item(10, 0).validate().is_err());

        let mut backwards = item(10, 1);
        backwards.end_time = backwards.start_time;
        assert!(backwards.validate().is_err());
    }
}
