use super::ui;
use crate::core::ledger::{Ledger, SubscriptionDraft, SubscriptionPatch};
use crate::core::recurrence;
use crate::core::subscription::{BillingCycle, Category, Currency, Subscription, SubscriptionId};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::warn;

/// Command-line input for a new subscription, before validation.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub cycle: String,
    pub start: String,
    pub category: String,
    pub color: Option<String>,
}

/// Unknown category names fall back to `Other` with a warning.
fn parse_category(name: &str) -> Category {
    Category::parse_strict(name).unwrap_or_else(|| {
        warn!("Unknown category {:?}, using {}", name, Category::Other);
        Category::Other
    })
}

impl AddArgs {
    pub fn into_draft(self) -> Result<SubscriptionDraft> {
        Ok(SubscriptionDraft {
            name: self.name,
            price: self.price,
            currency: self.currency.parse::<Currency>()?,
            billing_cycle: self.cycle.parse::<BillingCycle>()?,
            start_date: recurrence::parse_start_date(&self.start)?,
            category: parse_category(&self.category),
            color: self.color,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditArgs {
    pub id: SubscriptionId,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub cycle: Option<String>,
    pub start: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub active: Option<bool>,
}

impl EditArgs {
    pub fn into_patch(self) -> Result<SubscriptionPatch> {
        let patch = SubscriptionPatch {
            name: self.name,
            price: self.price,
            currency: self
                .currency
                .as_deref()
                .map(str::parse::<Currency>)
                .transpose()?,
            billing_cycle: self
                .cycle
                .as_deref()
                .map(str::parse::<BillingCycle>)
                .transpose()?,
            start_date: self
                .start
                .as_deref()
                .map(recurrence::parse_start_date)
                .transpose()?,
            category: self.category.as_deref().map(parse_category),
            color: self.color,
            active: self.active,
        };
        if patch.is_empty() {
            bail!("Nothing to update for subscription {}", self.id);
        }
        Ok(patch)
    }
}

fn describe(sub: &Subscription) -> String {
    format!(
        "#{} {} ({:.2} {} {}), next payment on {}",
        sub.id,
        sub.name,
        sub.price,
        sub.currency,
        sub.billing_cycle,
        ui::format_date(sub.next_payment_date)
    )
}

pub async fn add(ledger: &Ledger, args: AddArgs, today: NaiveDate) -> Result<Subscription> {
    let draft = args.into_draft()?;
    let sub = ledger.add(draft, today).await?;
    println!("Added {}", describe(&sub));
    Ok(sub)
}

pub async fn edit(ledger: &Ledger, args: EditArgs, today: NaiveDate) -> Result<Subscription> {
    let id = args.id;
    let patch = args.into_patch()?;
    let sub = ledger.update(id, patch, today).await?;
    println!("Updated {}", describe(&sub));
    Ok(sub)
}

pub async fn remove(ledger: &Ledger, id: SubscriptionId) -> Result<()> {
    ledger.remove(id).await?;
    println!("Removed subscription #{id}");
    Ok(())
}

pub async fn refresh(ledger: &Ledger, today: NaiveDate) -> Result<Vec<Subscription>> {
    let refreshed = ledger.refresh(today).await?;
    if refreshed.is_empty() {
        println!(
            "{}",
            ui::style_text("All payment dates are up to date.", ui::StyleType::Subtle)
        );
    }
    for sub in &refreshed {
        println!("Rolled forward {}", describe(sub));
    }
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::LedgerError;
    use crate::core::recurrence::RecurrenceError;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn add_args(start: &str) -> AddArgs {
        AddArgs {
            name: "Spotify".to_string(),
            price: 9.99,
            currency: "EUR".to_string(),
            cycle: "monthly".to_string(),
            start: start.to_string(),
            category: "Entertainment".to_string(),
            color: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_into_draft() {
        let draft = add_args("2024-01-15").into_draft().unwrap();
        assert_eq!(draft.currency, Currency::Eur);
        assert_eq!(draft.billing_cycle, BillingCycle::Monthly);
        assert_eq!(draft.start_date, date(2024, 1, 15));
        assert_eq!(draft.category, Category::Entertainment);

        let mut unknown = add_args("2024-01-15");
        unknown.category = "Groceries".to_string();
        assert_eq!(unknown.into_draft().unwrap().category, Category::Other);
    }

    #[test]
    fn test_into_draft_rejects_bad_input() {
        let err = add_args("15/01/2024").into_draft().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecurrenceError>(),
            Some(RecurrenceError::InvalidDate(_))
        ));

        let mut bad_cycle = add_args("2024-01-15");
        bad_cycle.cycle = "weekly".to_string();
        let err = bad_cycle.into_draft().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecurrenceError>(),
            Some(RecurrenceError::InvalidCycle(_))
        ));

        let mut bad_currency = add_args("2024-01-15");
        bad_currency.currency = "JPY".to_string();
        assert!(bad_currency.into_draft().is_err());
    }

    #[test]
    fn test_empty_edit_is_rejected() {
        let err = EditArgs {
            id: 7,
            ..Default::default()
        }
        .into_patch()
        .unwrap_err();
        assert!(err.to_string().contains("Nothing to update"));
    }

    #[tokio::test]
    async fn test_manage_flow() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()), "default");
        let today = date(2024, 3, 1);

        let sub = add(&ledger, add_args("2023-01-31"), today).await.unwrap();
        assert_eq!(sub.next_payment_date, date(2024, 3, 31));

        let edited = edit(
            &ledger,
            EditArgs {
                id: sub.id,
                cycle: Some("yearly".to_string()),
                ..Default::default()
            },
            today,
        )
        .await
        .unwrap();
        assert_eq!(edited.billing_cycle, BillingCycle::Yearly);
        assert_eq!(edited.next_payment_date, date(2025, 1, 31));

        let refreshed = refresh(&ledger, date(2025, 2, 1)).await.unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].next_payment_date, date(2026, 1, 31));

        remove(&ledger, sub.id).await.unwrap();
        let err = remove(&ledger, sub.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::NotFound(_))
        ));
    }
}
