//! Subscription records and the closed enumerations they are built from.

use crate::core::recurrence::RecurrenceError;
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;

pub type SubscriptionId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Ron,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Ron, Currency::Usd, Currency::Eur, Currency::Gbp];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ron => "RON",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("Unsupported currency: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Length of one cycle in calendar months.
    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

impl Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            _ => Err(RecurrenceError::InvalidCycle(s.to_string())),
        }
    }
}

/// Spending category. Unknown names fall into [`Category::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Entertainment,
    Utilities,
    Software,
    Health,
    Gym,
    #[default]
    Other,
}

impl Category {
    /// Every bucket, in display order.
    pub const ALL: [Category; 6] = [
        Category::Entertainment,
        Category::Utilities,
        Category::Software,
        Category::Health,
        Category::Gym,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Software => "Software",
            Category::Health => "Health",
            Category::Gym => "Gym",
            Category::Other => "Other",
        }
    }

    /// Exact (case-insensitive) lookup without the catch-all fallback.
    pub fn parse_strict(s: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::parse_strict(s).unwrap_or(Category::Other)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Category::from(name.as_str()))
    }
}

pub const DEFAULT_COLOR: &str = "#000000";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_active() -> bool {
    true
}

/// A stored subscription.
///
/// `next_payment_date` is derived from `start_date` and `billing_cycle` by
/// [`crate::core::recurrence`]; it is never taken from user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: String,
    pub name: String,
    pub price: f64,
    pub currency: Currency,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub next_payment_date: NaiveDate,
    pub category: Category,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// A validated subscription that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub owner: String,
    pub name: String,
    pub price: f64,
    pub currency: Currency,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub next_payment_date: NaiveDate,
    pub category: Category,
    pub color: String,
    pub active: bool,
}

impl NewSubscription {
    pub fn with_id(self, id: SubscriptionId) -> Subscription {
        Subscription {
            id,
            owner: self.owner,
            name: self.name,
            price: self.price,
            currency: self.currency,
            billing_cycle: self.billing_cycle,
            start_date: self.start_date,
            next_payment_date: self.next_payment_date,
            category: self.category,
            color: self.color,
            active: self.active,
        }
    }
}
