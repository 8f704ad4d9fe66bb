use crate::core::subscription::Currency;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com";
const DEFAULT_CACHE_TTL_MINUTES: u64 = 720;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub exchange_rate: Option<ExchangeRateProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            exchange_rate: Some(ExchangeRateProviderConfig {
                base_url: DEFAULT_EXCHANGE_RATE_URL.to_string(),
            }),
        }
    }
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_MINUTES
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RatesConfig {
    /// How long fetched rates are reused, in minutes. Zero disables caching.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_minutes: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        RatesConfig {
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
        }
    }
}

impl RatesConfig {
    /// `None` when caching is disabled. Very large values saturate rather
    /// than overflow.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_minutes > 0)
            .then(|| Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60)))
    }
}

fn default_owner() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Baseline currency for all monthly figures.
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "subtrack", "subtrack")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn exchange_rate_url(&self) -> &str {
        self.providers
            .exchange_rate
            .as_ref()
            .map_or(DEFAULT_EXCHANGE_RATE_URL, |p| &p.base_url)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read config file: {} (run `subtrack setup` to create one)",
                path.as_ref().display()
            )
        })?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
currency: EUR
owner: "alice"
providers:
  exchange_rate:
    base_url: "http://example.com/rates"
rates:
  cache_ttl_minutes: 0
data_path: "/tmp/subtrack-data"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.currency, Currency::Eur);
        assert_eq!(config.owner, "alice");
        assert_eq!(config.exchange_rate_url(), "http://example.com/rates");
        assert_eq!(config.rates.cache_ttl(), None);
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/subtrack-data")
        );
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("currency: RON").unwrap();
        assert_eq!(config.currency, Currency::Ron);
        assert_eq!(config.owner, "default");
        assert_eq!(config.exchange_rate_url(), DEFAULT_EXCHANGE_RATE_URL);
        assert_eq!(config.rates.cache_ttl(), Some(Duration::from_secs(720 * 60)));
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_huge_cache_ttl_saturates() {
        let config: AppConfig =
            serde_yaml::from_str("rates:\n  cache_ttl_minutes: 400000000000000000\n").unwrap();
        assert_eq!(
            config.rates.cache_ttl(),
            Some(Duration::from_secs(u64::MAX))
        );

        let disabled: AppConfig = serde_yaml::from_str("rates:\n  cache_ttl_minutes: 0\n").unwrap();
        assert!(disabled.rates.cache_ttl().is_none());
    }

    #[test]
    fn test_config_rejects_unknown_currency() {
        assert!(serde_yaml::from_str::<AppConfig>("currency: JPY").is_err());
    }

    #[test]
    fn test_load_from_missing_path_mentions_setup() {
        let err = AppConfig::load_from_path("/nonexistent/subtrack/config.yaml").unwrap_err();
        assert!(err.to_string().contains("subtrack setup"));
    }
}
