//! Validated create/update/delete of subscriptions on top of a record store.
//!
//! This is the only place that writes `next_payment_date`: it is derived on
//! create, re-derived when the start date or billing cycle changes, and
//! rolled forward by [`Ledger::refresh`].
use crate::core::recurrence::{self, RecurrenceError};
use crate::core::store::SubscriptionStore;
use crate::core::subscription::{
    BillingCycle, Category, Currency, DEFAULT_COLOR, NewSubscription, Subscription,
    SubscriptionId,
};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error("Subscription name must not be empty")]
    EmptyName,
    #[error("Price must be a positive amount, got {0}")]
    InvalidPrice(f64),
    #[error("Subscription {0} not found")]
    NotFound(SubscriptionId),
    #[error("Record store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// User input for a new subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionDraft {
    pub name: String,
    pub price: f64,
    pub currency: Currency,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub category: Category,
    pub color: Option<String>,
}

/// Fields to change on an existing subscription. There is deliberately no
/// way to set the next payment date.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<Currency>,
    pub billing_cycle: Option<BillingCycle>,
    pub start_date: Option<NaiveDate>,
    pub category: Option<Category>,
    pub color: Option<String>,
    pub active: Option<bool>,
}

impl SubscriptionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.currency.is_none()
            && self.billing_cycle.is_none()
            && self.start_date.is_none()
            && self.category.is_none()
            && self.color.is_none()
            && self.active.is_none()
    }
}

fn validate_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: f64) -> Result<f64, LedgerError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(LedgerError::InvalidPrice(price));
    }
    Ok(price)
}

pub struct Ledger {
    store: Arc<dyn SubscriptionStore>,
    owner: String,
}

impl Ledger {
    pub fn new(store: Arc<dyn SubscriptionStore>, owner: &str) -> Self {
        Self {
            store,
            owner: owner.to_string(),
        }
    }

    pub async fn add(
        &self,
        draft: SubscriptionDraft,
        today: NaiveDate,
    ) -> Result<Subscription, LedgerError> {
        let name = validate_name(&draft.name)?;
        let price = validate_price(draft.price)?;
        let next_payment_date =
            recurrence::next_payment_date(draft.start_date, draft.billing_cycle, today)?;

        let record = NewSubscription {
            owner: self.owner.clone(),
            name,
            price,
            currency: draft.currency,
            billing_cycle: draft.billing_cycle,
            start_date: draft.start_date,
            next_payment_date,
            category: draft.category,
            color: draft.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            active: true,
        };
        let created = self.store.create(record).await?;
        info!(id = created.id, name = %created.name, "Subscription created");
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<Subscription>, LedgerError> {
        Ok(self.store.list(&self.owner).await?)
    }

    pub async fn get(&self, id: SubscriptionId) -> Result<Subscription, LedgerError> {
        match self.store.get(id).await? {
            Some(sub) if sub.owner == self.owner => Ok(sub),
            _ => Err(LedgerError::NotFound(id)),
        }
    }

    /// Applies `patch`. The next payment date is only recomputed when the
    /// start date or billing cycle actually changes.
    pub async fn update(
        &self,
        id: SubscriptionId,
        patch: SubscriptionPatch,
        today: NaiveDate,
    ) -> Result<Subscription, LedgerError> {
        let mut sub = self.get(id).await?;

        if let Some(name) = patch.name {
            sub.name = validate_name(&name)?;
        }
        if let Some(price) = patch.price {
            sub.price = validate_price(price)?;
        }
        if let Some(currency) = patch.currency {
            sub.currency = currency;
        }
        if let Some(category) = patch.category {
            sub.category = category;
        }
        if let Some(color) = patch.color {
            sub.color = color;
        }
        if let Some(active) = patch.active {
            sub.active = active;
        }

        let start_changed = patch.start_date.is_some_and(|d| d != sub.start_date);
        let cycle_changed = patch.billing_cycle.is_some_and(|c| c != sub.billing_cycle);
        if start_changed || cycle_changed {
            let start = patch.start_date.unwrap_or(sub.start_date);
            let cycle = patch.billing_cycle.unwrap_or(sub.billing_cycle);
            sub.next_payment_date = recurrence::next_payment_date(start, cycle, today)?;
            sub.start_date = start;
            sub.billing_cycle = cycle;
            debug!(id, next = %sub.next_payment_date, "Recomputed next payment date");
        }

        let updated = self.store.update(sub).await?;
        info!(id, "Subscription updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: SubscriptionId) -> Result<(), LedgerError> {
        // ownership check before deleting
        self.get(id).await?;
        if !self.store.delete(id).await? {
            return Err(LedgerError::NotFound(id));
        }
        info!(id, "Subscription deleted");
        Ok(())
    }

    /// Rolls every past-due next payment date forward from its start date.
    /// Returns the records that changed.
    pub async fn refresh(&self, today: NaiveDate) -> Result<Vec<Subscription>, LedgerError> {
        let mut refreshed = Vec::new();
        for mut sub in self.store.list(&self.owner).await? {
            if sub.next_payment_date >= today {
                continue;
            }
            sub.next_payment_date =
                recurrence::next_payment_date(sub.start_date, sub.billing_cycle, today)?;
            refreshed.push(self.store.update(sub).await?);
        }
        debug!("Refreshed {} subscriptions", refreshed.len());
        Ok(refreshed)
    }
}
