//! Normalizes subscription prices to a monthly figure in the baseline
//! currency and aggregates them into spend reports.
use crate::core::currency::{RateSnapshot, RateSource, RateTable};
use crate::core::subscription::{BillingCycle, Category, Currency, Subscription, SubscriptionId};
use tracing::debug;

/// Monthly cost in the rate table's base currency. Yearly prices are spread
/// over twelve months before conversion.
pub fn monthly_equivalent(
    price: f64,
    currency: Currency,
    cycle: BillingCycle,
    rates: &RateTable,
) -> f64 {
    let monthly = match cycle {
        BillingCycle::Monthly => price,
        BillingCycle::Yearly => price / 12.0,
    };
    rates.to_base(monthly, currency)
}

impl Subscription {
    pub fn monthly_cost(&self, rates: &RateTable) -> f64 {
        monthly_equivalent(self.price, self.currency, self.billing_cycle, rates)
    }
}

fn included(sub: &Subscription, active_only: bool) -> bool {
    !active_only || sub.active
}

/// Sum of monthly equivalents. Inactive subscriptions count unless
/// `active_only` is set.
pub fn total_monthly_spend(subs: &[Subscription], rates: &RateTable, active_only: bool) -> f64 {
    subs.iter()
        .filter(|s| included(s, active_only))
        .map(|s| s.monthly_cost(rates))
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySpend {
    pub category: Category,
    pub monthly: f64,
}

/// Monthly spend per category. Every category is present, in
/// [`Category::ALL`] order, even when nothing is spent on it.
pub fn spend_by_category(
    subs: &[Subscription],
    rates: &RateTable,
    active_only: bool,
) -> Vec<CategorySpend> {
    let mut buckets: Vec<CategorySpend> = Category::ALL
        .into_iter()
        .map(|category| CategorySpend {
            category,
            monthly: 0.0,
        })
        .collect();

    for sub in subs.iter().filter(|s| included(s, active_only)) {
        // ALL is exhaustive, so the position always exists
        if let Some(bucket) = buckets.iter_mut().find(|b| b.category == sub.category) {
            bucket.monthly += sub.monthly_cost(rates);
        }
    }
    buckets
}

/// Monthly cost of a single subscription and its share of the total.
#[derive(Debug, Clone)]
pub struct SubscriptionSpend {
    pub id: SubscriptionId,
    pub name: String,
    pub category: Category,
    pub monthly: f64,
    pub weight: Option<f64>,
}

#[derive(Debug)]
pub struct SpendReport {
    pub baseline: Currency,
    pub subscriptions: Vec<SubscriptionSpend>,
    pub by_category: Vec<CategorySpend>,
    pub total_monthly: f64,
    pub rate_source: RateSource,
    pub degraded: bool,
}

impl SpendReport {
    pub fn total_yearly(&self) -> f64 {
        self.total_monthly * 12.0
    }
}

/// Builds a full spend report from one record list and one rate snapshot.
pub fn build_report(subs: &[Subscription], snapshot: &RateSnapshot, active_only: bool) -> SpendReport {
    let rates = &snapshot.table;
    let total_monthly = total_monthly_spend(subs, rates, active_only);

    let subscriptions = subs
        .iter()
        .filter(|s| included(s, active_only))
        .map(|s| {
            let monthly = s.monthly_cost(rates);
            SubscriptionSpend {
                id: s.id,
                name: s.name.clone(),
                category: s.category,
                monthly,
                weight: (total_monthly > 0.0).then(|| (monthly / total_monthly) * 100.0),
            }
        })
        .collect();

    debug!(
        "Report over {} subscriptions: {total_monthly:.2} {} per month ({:?} rates)",
        subs.len(),
        rates.base(),
        snapshot.source
    );

    SpendReport {
        baseline: rates.base(),
        subscriptions,
        by_category: spend_by_category(subs, rates, active_only),
        total_monthly,
        rate_source: snapshot.source,
        degraded: snapshot.is_degraded(),
    }
}
