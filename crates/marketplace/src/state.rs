//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::MarketplaceConfig;
use crate::db::{
    DiscountRepository, InMemoryStore, PgDiscountRepository, PgReservationRepository,
    ReservationRepository,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the configured
/// repositories.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: MarketplaceConfig,
    discounts: Arc<dyn DiscountRepository>,
    reservations: Arc<dyn ReservationRepository>,
    pool: Option<PgPool>,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: MarketplaceConfig, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                discounts: Arc::new(PgDiscountRepository::new(pool.clone())),
                reservations: Arc::new(PgReservationRepository::new(pool.clone())),
                pool: Some(pool),
            }),
        }
    }

    /// State backed by an in-memory store.
    #[must_use]
    pub fn in_memory(config: MarketplaceConfig, store: InMemoryStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                discounts: Arc::new(store.clone()),
                reservations: Arc::new(store),
                pool: None,
            }),
        }
    }

    /// Get a reference to the marketplace configuration.
    #[must_use]
    pub fn config(&self) -> &MarketplaceConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn discounts(&self) -> &dyn DiscountRepository {
        self.inner.discounts.as_ref()
    }

    #[must_use]
    pub fn reservations(&self) -> &dyn ReservationRepository {
        self.inner.reservations.as_ref()
    }

    /// The database pool, if state is backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
