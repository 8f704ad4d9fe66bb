pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::list::ListArgs;
use crate::cli::manage::{AddArgs, EditArgs};
use crate::core::cache::RateCache;
use crate::core::config::AppConfig;
use crate::core::ledger::Ledger;
use crate::core::subscription::SubscriptionId;
use crate::core::ExchangeRateProvider;
use crate::providers::caching::CachingRateProvider;
use crate::providers::exchange_rate::ExchangeRateApiProvider;
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Add(AddArgs),
    List(ListArgs),
    Edit(EditArgs),
    Remove { id: SubscriptionId },
    Refresh { clear_rates: bool },
    Summary { active_only: bool },
}

/// Builds the exchange rate provider, wrapped in a cache unless caching is
/// disabled in the config.
fn rate_provider(
    config: &AppConfig,
    cache: Arc<dyn RateCache>,
) -> Result<Box<dyn ExchangeRateProvider + Send + Sync>> {
    let live = ExchangeRateApiProvider::new(config.exchange_rate_url())?;
    let provider: Box<dyn ExchangeRateProvider + Send + Sync> = match config.rates.cache_ttl() {
        Some(ttl) => Box::new(CachingRateProvider::new(live, cache, ttl)),
        None => Box::new(live),
    };
    Ok(provider)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Subscription tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = Arc::new(store::open(&config)?);
    let ledger = Ledger::new(store.clone(), &config.owner);
    let today = Local::now().date_naive();

    match command {
        AppCommand::Add(args) => cli::manage::add(&ledger, args, today).await.map(|_| ()),
        AppCommand::Edit(args) => cli::manage::edit(&ledger, args, today).await.map(|_| ()),
        AppCommand::Remove { id } => cli::manage::remove(&ledger, id).await,
        AppCommand::Refresh { clear_rates } => {
            if clear_rates {
                store.clear().await;
                info!("Cleared cached exchange rates");
            }
            cli::manage::refresh(&ledger, today).await.map(|_| ())
        }
        AppCommand::List(args) => {
            let provider = rate_provider(&config, store)?;
            cli::list::run(&ledger, provider.as_ref(), config.currency, args).await
        }
        AppCommand::Summary { active_only } => {
            let provider = rate_provider(&config, store)?;
            cli::summary::run(&ledger, provider.as_ref(), config.currency, active_only, today)
                .await
                .map(|_| ())
        }
    }
}
