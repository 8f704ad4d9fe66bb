pub mod list;
pub mod manage;
pub mod setup;
pub mod summary;
pub mod ui;

use crate::core::currency::{self, ExchangeRateProvider, RateSnapshot};
use crate::core::subscription::Currency;

/// Resolves one rate snapshot for a report, with a spinner while fetching.
pub(crate) async fn load_rates(
    provider: &(dyn ExchangeRateProvider + Send + Sync),
    baseline: Currency,
) -> RateSnapshot {
    let pb = ui::new_spinner("Fetching exchange rates...");
    let snapshot = currency::resolve_rates(provider, baseline).await;
    pb.finish_and_clear();
    snapshot
}
