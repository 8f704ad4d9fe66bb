use crate::core::cache::RateCache;
use crate::core::currency::{ExchangeRateProvider, RateSnapshot, RateSource};
use crate::core::subscription::Currency;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Serves rates from a [`RateCache`] while they are fresh and refills it
/// from `inner` otherwise. Failures are not cached.
pub struct CachingRateProvider<P: ExchangeRateProvider> {
    inner: P,
    cache: Arc<dyn RateCache>,
    ttl: Duration,
}

impl<P: ExchangeRateProvider> CachingRateProvider<P> {
    pub fn new(inner: P, cache: Arc<dyn RateCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl<P: ExchangeRateProvider> ExchangeRateProvider for CachingRateProvider<P> {
    async fn fetch_rates(&self, base: Currency) -> Result<RateSnapshot> {
        if let Some(table) = self.cache.get(base).await {
            debug!("Cache hit for exchange rates: {}", base);
            return Ok(RateSnapshot {
                table,
                source: RateSource::Cached,
            });
        }

        debug!("Cache miss for exchange rates: {}", base);
        let snapshot = self.inner.fetch_rates(base).await?;
        if snapshot.source == RateSource::Live {
            self.cache.put(snapshot.table.clone(), Some(self.ttl)).await;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::RateTable;
    use crate::store::memory::MemoryRateCache;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockInnerProvider {
        call_count: AtomicUsize,
        failing: AtomicBool,
    }

    impl MockInnerProvider {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl<'a> ExchangeRateProvider for &'a MockInnerProvider {
        async fn fetch_rates(&self, base: Currency) -> Result<RateSnapshot> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(anyhow!("rate service down"));
            }
            Ok(RateSnapshot {
                table: RateTable::new(base).with_rate(Currency::Eur, 0.2),
                source: RateSource::Live,
            })
        }
    }

    #[tokio::test]
    async fn test_caching_rate_provider() {
        let inner = MockInnerProvider::new();
        let provider = CachingRateProvider::new(
            &inner,
            Arc::new(MemoryRateCache::new()),
            Duration::from_secs(60),
        );

        // First call - should hit inner provider
        let first = provider.fetch_rates(Currency::Ron).await.unwrap();
        assert_eq!(first.source, RateSource::Live);
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 1);

        // Second call - should be cached
        let second = provider.fetch_rates(Currency::Ron).await.unwrap();
        assert_eq!(second.source, RateSource::Cached);
        assert_eq!(second.table, first.table);
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 1);

        // Different base currency
        provider.fetch_rates(Currency::Usd).await.unwrap();
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = MockInnerProvider::new();
        inner.failing.store(true, Ordering::SeqCst);
        let provider = CachingRateProvider::new(
            &inner,
            Arc::new(MemoryRateCache::new()),
            Duration::from_secs(60),
        );

        assert!(provider.fetch_rates(Currency::Ron).await.is_err());

        inner.failing.store(false, Ordering::SeqCst);
        let snapshot = provider.fetch_rates(Currency::Ron).await.unwrap();
        assert_eq!(snapshot.source, RateSource::Live);
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 2);
    }
}
