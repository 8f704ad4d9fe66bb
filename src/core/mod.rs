//! Core business logic: billing recurrence, rate normalization and the
//! abstractions over record storage and rate sources.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod currency;
pub mod ledger;
pub mod log;
pub mod recurrence;
pub mod store;
pub mod subscription;
pub mod view;

// Re-export main types for cleaner imports
pub use currency::{ExchangeRateProvider, RateSnapshot, RateSource, RateTable};
pub use store::SubscriptionStore;
pub use subscription::{BillingCycle, Category, Currency, Subscription, SubscriptionId};
