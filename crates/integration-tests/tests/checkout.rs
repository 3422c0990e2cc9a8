//! Integration tests for quoting and checkout.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use qreserve_core::{
    DiscountType, LoyaltyDiscount, Promotion, PromotionId, SignupDiscount, UserId,
};
use qreserve_integration_tests::{TestContext, decimal, item};

const USER: UserId = UserId::new(1);

async fn seed_signup(ctx: &TestContext, discount: i64, discount_type: DiscountType) {
    ctx.store
        .insert_signup_discount(SignupDiscount {
            user_id: USER,
            discount: Decimal::from(discount),
            discount_type,
            is_used: false,
        })
        .await;
}

async fn seed_loyalty(ctx: &TestContext, discount: i64, threshold: i32) {
    ctx.store
        .insert_loyalty_discount(LoyaltyDiscount {
            user_id: USER,
            discount: Decimal::from(discount),
            discount_type: DiscountType::Percentage,
            threshold,
            is_used: false,
        })
        .await;
}

async fn seed_promotion(ctx: &TestContext, id: i32, discount: i64, ends_in: Duration) {
    let now = Utc::now();
    ctx.store
        .insert_promotion(Promotion {
            id: PromotionId::new(id),
            title: format!("Promotion {id}"),
            description: None,
            discount: Decimal::from(discount),
            discount_type: DiscountType::Fixed,
            is_active: true,
            start_date: Some(now - Duration::days(7)),
            end_date: Some(now + ends_in),
        })
        .await;
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_stacks_all_three_discounts() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;
    seed_loyalty(&ctx, 5, 5).await;
    seed_promotion(&ctx, 1, 5, Duration::days(7)).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "200", 1)],
                "appliedPromotionId": 1,
                "totalPrice": "165",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let reservation = &response.body["reservation"];
    assert_eq!(decimal(&reservation["originalPrice"]), Decimal::from(200));
    assert_eq!(decimal(&reservation["totalPrice"]), Decimal::from(165));
    assert_eq!(decimal(&reservation["totalDiscount"]), Decimal::from(35));
    assert_eq!(reservation["appliedPromotionId"], json!(1));
    assert_eq!(reservation["status"], json!("confirmed"));

    let kinds: Vec<&str> = reservation["appliedDiscounts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["SIGNUP", "LOYALTY", "PROMOTION"]);
    assert_eq!(response.body["warnings"], json!([]));
}

#[tokio::test]
async fn test_checkout_marks_discounts_used() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;
    seed_loyalty(&ctx, 10, 10).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [item(3, "300", 1)] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        decimal(&response.body["reservation"]["totalPrice"]),
        Decimal::from(240)
    );

    let summary = ctx.get("/api/discounts?userId=1").await;
    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.body["hasSignupDiscount"], json!(false));
    assert_eq!(summary.body["signupDiscountUsed"], json!(true));
    assert_eq!(summary.body["hasLoyaltyDiscount"], json!(false));
    assert_eq!(summary.body["loyaltyDiscountUsed"], json!(true));
}

#[tokio::test]
async fn test_signup_discount_applies_only_once() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;
    let body = json!({ "userId": 1, "reservationItems": [item(3, "100", 1)] });

    let first = ctx.post("/api/reservations", body.clone()).await;
    let second = ctx.post("/api/reservations", body).await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::CREATED);
    assert_eq!(
        decimal(&first.body["reservation"]["totalPrice"]),
        Decimal::from(90)
    );
    assert_eq!(
        decimal(&second.body["reservation"]["totalPrice"]),
        Decimal::from(100)
    );
}

#[tokio::test]
async fn test_discounts_larger_than_price_clamp_to_zero() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 40, DiscountType::Fixed).await;
    seed_loyalty(&ctx, 5, 5).await;
    seed_promotion(&ctx, 1, 10, Duration::days(1)).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "50", 1)],
                "appliedPromotionId": 1,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let reservation = &response.body["reservation"];
    assert_eq!(decimal(&reservation["totalPrice"]), Decimal::ZERO);
    assert_eq!(decimal(&reservation["totalDiscount"]), Decimal::from(50));
}

#[tokio::test]
async fn test_line_totals_use_quantity() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "25.50", 2), item(4, "9.99", 1)],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let reservation = &response.body["reservation"];
    assert_eq!(
        decimal(&reservation["originalPrice"]),
        Decimal::new(6099, 2)
    );
    assert_eq!(reservation["items"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Promotions at checkout
// =============================================================================

#[tokio::test]
async fn test_expired_promotion_is_left_out_and_reported() {
    let ctx = TestContext::new();
    seed_promotion(&ctx, 7, 20, -Duration::days(1)).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "100", 1)],
                "appliedPromotionId": 7,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        decimal(&response.body["reservation"]["totalPrice"]),
        Decimal::from(100)
    );
    assert_eq!(response.body["reservation"]["appliedPromotionId"], json!(null));
    assert_eq!(response.body["quote"]["promotionRejection"], json!("expired"));
}

#[tokio::test]
async fn test_unknown_promotion_is_reported_not_found() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/checkout/quote",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "100", 1)],
                "appliedPromotionId": 99,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["promotionRejection"], json!("notFound"));
    assert_eq!(decimal(&response.body["finalPrice"]), Decimal::from(100));
}

// =============================================================================
// Quote
// =============================================================================

#[tokio::test]
async fn test_quote_prices_without_consuming() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;
    seed_loyalty(&ctx, 5, 5).await;

    let body = json!({ "userId": 1, "reservationItems": [item(3, "300", 1)] });
    let first = ctx.post("/api/checkout/quote", body.clone()).await;
    let second = ctx.post("/api/checkout/quote", body).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(decimal(&first.body["originalPrice"]), Decimal::from(300));
    assert_eq!(decimal(&first.body["finalPrice"]), Decimal::from(255));
    assert_eq!(first.body, second.body);

    let reservations = ctx.get("/api/reservations/user/1").await;
    assert_eq!(reservations.body, json!([]));
    let summary = ctx.get("/api/discounts?userId=1").await;
    assert_eq!(summary.body["hasSignupDiscount"], json!(true));
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_price_mismatch_is_conflict_and_keeps_discounts() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "200", 1)],
                "totalPrice": "200",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["error"].is_string());

    let reservations = ctx.get("/api/reservations/user/1").await;
    assert_eq!(reservations.body, json!([]));
    let summary = ctx.get("/api/discounts?userId=1").await;
    assert_eq!(summary.body["hasSignupDiscount"], json!(true));
}

#[tokio::test]
async fn test_expected_total_within_a_cent_is_accepted() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;

    let response = ctx
        .post(
            "/api/reservations",
            json!({
                "userId": 1,
                "reservationItems": [item(3, "200", 1)],
                "totalPrice": "180.01",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_empty_reservation_is_bad_request() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_negative_item_price_is_bad_request() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/checkout/quote",
            json!({ "userId": 1, "reservationItems": [item(3, "-5", 1)] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_price_beyond_decimal_range_is_bad_request() {
    let ctx = TestContext::new();
    seed_promotion(&ctx, 1, 5, Duration::days(1)).await;

    let response = ctx
        .post(
            "/api/checkout/quote",
            json!({
                "userId": 1,
                "reservationItems": [item(1, "79228162514264337593543950335", 2)],
                "appliedPromotionId": 1,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unstorable_prices_rejected_without_consuming() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;

    let sub_cent = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [item(3, "10.005", 3)] }),
        )
        .await;
    let over_cap = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [item(3, "10000000000", 1)] }),
        )
        .await;

    assert_eq!(sub_cent.status, StatusCode::BAD_REQUEST);
    assert_eq!(over_cap.status, StatusCode::BAD_REQUEST);
    let summary = ctx.get("/api/discounts?userId=1").await;
    assert_eq!(summary.body["hasSignupDiscount"], json!(true));
    assert_eq!(ctx.get("/api/reservations/user/1").await.body, json!([]));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let ctx = TestContext::new();

    let response = ctx
        .post("/api/reservations", json!({ "reservationItems": "nope" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_insert_releases_signup_claim() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;
    ctx.store.fail_reservation_writes(true);

    let response = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [item(3, "100", 1)] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let summary = ctx.get("/api/discounts?userId=1").await;
    assert_eq!(summary.body["hasSignupDiscount"], json!(true));
}

#[tokio::test]
async fn test_failed_loyalty_hold_is_a_warning() {
    let ctx = TestContext::new();
    seed_loyalty(&ctx, 10, 10).await;
    ctx.store.fail_loyalty_writes(true);

    let response = ctx
        .post(
            "/api/reservations",
            json!({ "userId": 1, "reservationItems": [item(3, "100", 1)] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        decimal(&response.body["reservation"]["totalPrice"]),
        Decimal::from(90)
    );
    assert_eq!(response.body["warnings"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_apply_signup_once() {
    let ctx = TestContext::new();
    seed_signup(&ctx, 10, DiscountType::Percentage).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.post(
                    "/api/reservations",
                    json!({ "userId": 1, "reservationItems": [item(3, "100", 1)] }),
                )
                .await
            })
        })
        .collect();

    let mut discounted = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        if decimal(&response.body["reservation"]["totalPrice"]) == Decimal::from(90) {
            discounted += 1;
        }
    }

    assert_eq!(discounted, 1);
    let reservations = ctx.get("/api/reservations/user/1").await;
    assert_eq!(reservations.body.as_array().unwrap().len(), 8);
}
