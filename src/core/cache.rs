use crate::core::currency::RateTable;
use crate::core::subscription::Currency;
use async_trait::async_trait;
use std::time::Duration;

/// Storage for the last live rate table per base currency.
///
/// Failures are swallowed by implementations: a cache that cannot be read
/// behaves like an empty one.
#[async_trait]
pub trait RateCache: Send + Sync {
    async fn get(&self, base: Currency) -> Option<RateTable>;

    async fn put(&self, table: RateTable, ttl: Option<Duration>);

    async fn clear(&self);
}
