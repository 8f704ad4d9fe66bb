use super::{load_rates, ui};
use crate::core::currency::{ExchangeRateProvider, RateTable};
use crate::core::ledger::Ledger;
use crate::core::subscription::{Currency, Subscription};
use crate::core::view::{self, CategoryFilter, SortOrder, ViewQuery};
use anyhow::Result;
use comfy_table::Cell;

/// Raw listing options as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

impl ListArgs {
    pub fn into_query(self) -> Result<ViewQuery> {
        Ok(ViewQuery {
            search: self.search,
            category: self
                .category
                .as_deref()
                .map(str::parse::<CategoryFilter>)
                .transpose()?
                .unwrap_or_default(),
            sort: self
                .sort
                .as_deref()
                .map(str::parse::<SortOrder>)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

pub fn display_as_table(subs: &[&Subscription], rates: &RateTable) -> String {
    let baseline = rates.base();
    let mut table = ui::new_styled_table();

    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Name"),
        ui::header_cell("Category"),
        ui::header_cell("Price"),
        ui::header_cell("Cycle"),
        ui::header_cell(&format!("Monthly ({baseline})")),
        ui::header_cell("Next payment"),
        ui::header_cell("Status"),
    ]);

    for sub in subs {
        table.add_row(vec![
            Cell::new(sub.id),
            Cell::new(&sub.name),
            Cell::new(sub.category),
            Cell::new(format!("{:.2} {}", sub.price, sub.currency)),
            Cell::new(sub.billing_cycle),
            ui::amount_cell(sub.monthly_cost(rates)),
            Cell::new(ui::format_date(sub.next_payment_date)),
            ui::active_cell(sub.active),
        ]);
    }

    table.to_string()
}

pub async fn run(
    ledger: &Ledger,
    rate_provider: &(dyn ExchangeRateProvider + Send + Sync),
    baseline: Currency,
    args: ListArgs,
) -> Result<()> {
    let query = args.into_query()?;
    let subs = ledger.list().await?;
    let snapshot = load_rates(rate_provider, baseline).await;

    let shown = view::apply(&subs, &snapshot.table, &query);
    if shown.is_empty() {
        println!("No subscriptions found.");
    } else {
        println!("{}", display_as_table(&shown, &snapshot.table));
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "{} of {} subscriptions, sorted by {}",
                    shown.len(),
                    subs.len(),
                    query.sort
                ),
                ui::StyleType::Subtle
            )
        );
    }

    if snapshot.is_degraded() {
        println!("{}", ui::degraded_notice());
    }
    Ok(())
}
