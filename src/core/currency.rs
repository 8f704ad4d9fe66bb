//! Exchange rate snapshots and the provider abstraction behind them.

use crate::core::subscription::Currency;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Approximate rates against RON, used when no live data is available.
const FALLBACK_RON_RATES: [(Currency, f64); 4] = [
    (Currency::Ron, 1.0),
    (Currency::Eur, 0.20),
    (Currency::Usd, 0.22),
    (Currency::Gbp, 0.17),
];

/// Rates expressed as units of a currency per one unit of `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    base: Currency,
    rates: HashMap<Currency, f64>,
}

impl RateTable {
    pub fn new(base: Currency) -> Self {
        let mut rates = HashMap::new();
        rates.insert(base, 1.0);
        Self { base, rates }
    }

    /// The built-in table, rebased onto `base`.
    pub fn fallback(base: Currency) -> Self {
        let base_per_ron = FALLBACK_RON_RATES
            .iter()
            .find(|(c, _)| *c == base)
            .map_or(1.0, |(_, r)| *r);
        FALLBACK_RON_RATES
            .iter()
            .fold(Self::new(base), |table, (currency, rate)| {
                table.with_rate(*currency, rate / base_per_ron)
            })
    }

    pub fn with_rate(mut self, currency: Currency, rate: f64) -> Self {
        self.insert(currency, rate);
        self
    }

    pub fn insert(&mut self, currency: Currency, rate: f64) {
        if currency != self.base {
            self.rates.insert(currency, rate);
        }
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    /// Rate used for conversion. Missing or unusable rates count as 1 so one
    /// bad entry does not sink a whole aggregation.
    pub fn rate(&self, currency: Currency) -> f64 {
        match self.rates.get(&currency) {
            Some(rate) if rate.is_finite() && *rate > 0.0 => *rate,
            Some(rate) => {
                debug!("Ignoring unusable rate {rate} for {currency}");
                1.0
            }
            None => {
                debug!("No rate for {currency} against {}, assuming 1", self.base);
                1.0
            }
        }
    }

    /// Converts an amount in `currency` into the base currency.
    pub fn to_base(&self, amount: f64, currency: Currency) -> f64 {
        amount / self.rate(currency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Live,
    Cached,
    Fallback,
}

/// One immutable set of rates used for a whole report.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub table: RateTable,
    pub source: RateSource,
}

impl RateSnapshot {
    pub fn fallback(base: Currency) -> Self {
        Self {
            table: RateTable::fallback(base),
            source: RateSource::Fallback,
        }
    }

    /// True when the figures were computed from the built-in approximate rates.
    pub fn is_degraded(&self) -> bool {
        self.source == RateSource::Fallback
    }
}

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn fetch_rates(&self, base: Currency) -> Result<RateSnapshot>;
}

/// Fetches rates for `base`, substituting the built-in table when the
/// provider fails. Never returns an error.
pub async fn resolve_rates(
    provider: &(dyn ExchangeRateProvider + Send + Sync),
    base: Currency,
) -> RateSnapshot {
    match provider.fetch_rates(base).await {
        Ok(snapshot) => {
            debug!("Using {:?} rates for {}", snapshot.source, base);
            snapshot
        }
        Err(e) => {
            warn!(error = %e, "Exchange rates unavailable, using built-in approximate rates");
            RateSnapshot::fallback(base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingProvider;

    #[async_trait]
    impl ExchangeRateProvider for FailingProvider {
        async fn fetch_rates(&self, _base: Currency) -> Result<RateSnapshot> {
            Err(anyhow!("connection refused"))
        }
    }

    struct FixedProvider(RateTable);

    #[async_trait]
    impl ExchangeRateProvider for FixedProvider {
        async fn fetch_rates(&self, _base: Currency) -> Result<RateSnapshot> {
            Ok(RateSnapshot {
                table: self.0.clone(),
                source: RateSource::Live,
            })
        }
    }

    #[test]
    fn test_missing_or_bad_rates_count_as_one() {
        let table = RateTable::new(Currency::Ron)
            .with_rate(Currency::Eur, 0.0)
            .with_rate(Currency::Usd, f64::NAN);
        assert_eq!(table.rate(Currency::Eur), 1.0);
        assert_eq!(table.rate(Currency::Usd), 1.0);
        assert_eq!(table.rate(Currency::Gbp), 1.0);
        assert_eq!(table.rate(Currency::Ron), 1.0);
    }

    #[test]
    fn test_base_rate_cannot_be_overridden() {
        let table = RateTable::new(Currency::Eur).with_rate(Currency::Eur, 4.0);
        assert_eq!(table.rate(Currency::Eur), 1.0);
    }

    #[test]
    fn test_fallback_table_covers_every_currency() {
        let table = RateTable::fallback(Currency::Ron);
        assert_eq!(table.rate(Currency::Ron), 1.0);
        assert_eq!(table.rate(Currency::Eur), 0.20);
        assert_eq!(table.rate(Currency::Usd), 0.22);
        assert_eq!(table.rate(Currency::Gbp), 0.17);
    }

    #[test]
    fn test_fallback_table_rebases() {
        let table = RateTable::fallback(Currency::Eur);
        assert_eq!(table.rate(Currency::Eur), 1.0);
        assert!((table.rate(Currency::Ron) - 5.0).abs() < 1e-9);
        // 100 RON is 20 EUR either way
        assert!((table.to_base(100.0, Currency::Ron) - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_resolve_rates_falls_back_on_failure() {
        let snapshot = resolve_rates(&FailingProvider, Currency::Ron).await;
        assert!(snapshot.is_degraded());
        assert_eq!(snapshot.table, RateTable::fallback(Currency::Ron));
    }

    #[tokio::test]
    async fn test_resolve_rates_passes_live_data_through() {
        let table = RateTable::new(Currency::Ron).with_rate(Currency::Eur, 0.2011);
        let snapshot = resolve_rates(&FixedProvider(table.clone()), Currency::Ron).await;
        assert!(!snapshot.is_degraded());
        assert_eq!(snapshot.source, RateSource::Live);
        assert_eq!(snapshot.table, table);
    }
}
