use super::util::{RetryPolicy, with_retry};
use crate::core::currency::{ExchangeRateProvider, RateSnapshot, RateSource, RateTable};
use crate::core::subscription::Currency;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for exchangerate-api style endpoints (`/v4/latest/{BASE}`).
pub struct ExchangeRateApiProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("subtrack/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    base: Option<String>,
    rates: HashMap<String, f64>,
}

#[async_trait]
impl ExchangeRateProvider for ExchangeRateApiProvider {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: Currency) -> Result<RateSnapshot> {
        let url = format!("{}/v4/latest/{}", self.base_url, base.code());
        debug!("Requesting exchange rates from {}", url);

        let client = &self.client;
        let request_url = &url;
        let response = with_retry(
            || async move {
                client
                    .get(request_url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
            },
            self.retry,
        )
        .await
        .with_context(|| format!("Exchange rate request failed: {url}"))?;

        let data = response
            .json::<LatestRatesResponse>()
            .await
            .with_context(|| format!("Failed to parse exchange rate response for {base}"))?;

        if let Some(reported) = data.base.as_deref() {
            if !reported.eq_ignore_ascii_case(base.code()) {
                bail!("Exchange rates returned for {reported}, expected {base}");
            }
        }

        let mut table = RateTable::new(base);
        for (code, rate) in &data.rates {
            // the feed lists far more currencies than we track
            if let Ok(currency) = code.parse::<Currency>() {
                table.insert(currency, *rate);
            }
        }
        debug!(?table, "Received exchange rates");

        Ok(RateSnapshot {
            table,
            source: RateSource::Live,
        })
    }
}
