//! Integration tests for the QReserve marketplace API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p qreserve-integration-tests
//! ```
//!
//! The router runs in-process over [`InMemoryStore`], so no database or
//! listening socket is needed. Requests go through the full middleware stack
//! via `tower::ServiceExt::oneshot`.
//!
//! # Test Categories
//!
//! - `checkout` - Quote and checkout flows, discount stacking, concurrency
//! - `discounts` - Signup grants, toggles, promotions
//! - `reservations` - Listing, completion and loyalty tiers
//! - `postgres_repositories` - SQL claim and upsert semantics (ignored; needs a database)

use std::str::FromStr;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use qreserve_marketplace::config::MarketplaceConfig;
use qreserve_marketplace::db::InMemoryStore;
use qreserve_marketplace::state::AppState;

/// An in-process marketplace with direct access to its store.
#[derive(Clone)]
pub struct TestContext {
    pub store: InMemoryStore,
    router: Router,
}

/// Status, headers and parsed JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestContext {
    /// A marketplace with default configuration and an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: MarketplaceConfig) -> Self {
        let store = InMemoryStore::new();
        let router = qreserve_marketplace::app(AppState::in_memory(config, store.clone()));
        Self { store, router }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body)).await
    }

    /// Send a request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router fails, which only
    /// happens on a broken test setup.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with standard defaults and a placeholder database URL.
#[must_use]
pub fn test_config() -> MarketplaceConfig {
    MarketplaceConfig::with_database_url(SecretString::from("postgres://unused/test"))
}

/// Read a money field serialized as a string or number.
///
/// # Panics
///
/// Panics if the value is not a decimal.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

/// A one-hour reservation item for `service_id` at `price`.
#[must_use]
pub fn item(service_id: i32, price: &str, quantity: i32) -> Value {
    serde_json::json!({
        "serviceId": service_id,
        "price": price,
        "quantity": quantity,
        "startTime": "2026-11-02T10:00:00Z",
        "endTime": "2026-11-02T11:00:00Z",
    })
}
