//! Search, filter and sort over a loaded set of subscriptions.
use crate::core::currency::RateTable;
use crate::core::subscription::{Category, Subscription};
use anyhow::anyhow;
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    #[default]
    DateAsc,
    DateDesc,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortOrder::PriceAsc => "price-asc",
                SortOrder::PriceDesc => "price-desc",
                SortOrder::DateAsc => "date-asc",
                SortOrder::DateDesc => "date-desc",
            }
        )
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price-asc" => Ok(SortOrder::PriceAsc),
            "price-desc" => Ok(SortOrder::PriceDesc),
            "date-asc" => Ok(SortOrder::DateAsc),
            "date-desc" => Ok(SortOrder::DateDesc),
            _ => Err(anyhow!("Invalid sort order: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        Category::parse_strict(s)
            .map(CategoryFilter::Only)
            .ok_or_else(|| anyhow!("Unknown category: {}", s))
    }
}

/// Everything that shapes a listing. Passed in explicitly by the caller.
#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    pub search: Option<String>,
    pub category: CategoryFilter,
    pub sort: SortOrder,
}

impl ViewQuery {
    pub fn matches(&self, sub: &Subscription) -> bool {
        let name_matches = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => sub.name.to_lowercase().contains(&term.to_lowercase()),
        };
        let category_matches = match self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => sub.category == category,
        };
        name_matches && category_matches
    }
}

/// Filters and sorts `subs` without touching them. Equal keys keep their
/// input order.
pub fn apply<'a>(
    subs: &'a [Subscription],
    rates: &RateTable,
    query: &ViewQuery,
) -> Vec<&'a Subscription> {
    let mut keyed: Vec<(f64, &Subscription)> = subs
        .iter()
        .filter(|s| query.matches(s))
        .map(|s| (s.monthly_cost(rates), s))
        .collect();

    keyed.sort_by(|&(price_a, a), &(price_b, b)| compare(query.sort, (price_a, a), (price_b, b)));
    keyed.into_iter().map(|(_, s)| s).collect()
}

fn compare(order: SortOrder, a: (f64, &Subscription), b: (f64, &Subscription)) -> Ordering {
    match order {
        SortOrder::PriceAsc => a.0.total_cmp(&b.0),
        SortOrder::PriceDesc => b.0.total_cmp(&a.0),
        SortOrder::DateAsc => a.1.next_payment_date.cmp(&b.1.next_payment_date),
        SortOrder::DateDesc => b.1.next_payment_date.cmp(&a.1.next_payment_date),
    }
}
