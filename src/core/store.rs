//! Record store abstraction for subscriptions.

use crate::core::subscription::{NewSubscription, Subscription, SubscriptionId};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persists a new record and returns it with its assigned identifier.
    async fn create(&self, record: NewSubscription) -> Result<Subscription>;

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>>;

    /// All records of `owner`, earliest next payment first.
    async fn list(&self, owner: &str) -> Result<Vec<Subscription>>;

    /// Replaces the stored record with the same identifier.
    async fn update(&self, record: Subscription) -> Result<Subscription>;

    /// Returns `false` when no record had this identifier.
    async fn delete(&self, id: SubscriptionId) -> Result<bool>;
}

/// Orders records the way [`SubscriptionStore::list`] promises.
pub fn sort_by_next_payment(records: &mut [Subscription]) {
    records.sort_by(|a, b| {
        a.next_payment_date
            .cmp(&b.next_payment_date)
            .then(a.id.cmp(&b.id))
    });
}
