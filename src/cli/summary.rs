use super::{load_rates, ui};
use crate::core::analytics::{self, SpendReport};
use crate::core::currency::ExchangeRateProvider;
use crate::core::ledger::Ledger;
use crate::core::subscription::{Currency, Subscription};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

impl SpendReport {
    pub fn display_as_table(&self) -> String {
        let baseline = self.baseline;

        let mut subs_table = ui::new_styled_table();
        subs_table.set_header(vec![
            ui::header_cell("Subscription"),
            ui::header_cell("Category"),
            ui::header_cell(&format!("Monthly ({baseline})")),
            ui::header_cell("Weight (%)"),
        ]);
        for sub in &self.subscriptions {
            subs_table.add_row(vec![
                Cell::new(&sub.name),
                Cell::new(sub.category),
                ui::amount_cell(sub.monthly),
                ui::format_optional_cell(sub.weight, |w| format!("{w:.2}%")),
            ]);
        }

        let mut category_table = ui::new_styled_table();
        category_table.set_header(vec![
            ui::header_cell("Category"),
            ui::header_cell(&format!("Monthly ({baseline})")),
            ui::header_cell("Share (%)"),
        ]);
        for bucket in &self.by_category {
            let share = (self.total_monthly > 0.0)
                .then(|| bucket.monthly / self.total_monthly * 100.0);
            category_table.add_row(vec![
                Cell::new(bucket.category),
                ui::amount_cell(bucket.monthly),
                ui::format_optional_cell(share, |s| format!("{s:.2}%")),
            ]);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text("Subscriptions", ui::StyleType::Title)
        );
        output.push_str(&subs_table.to_string());
        output.push_str(&format!(
            "\n\n{}\n\n",
            ui::style_text("By category", ui::StyleType::Title)
        ));
        output.push_str(&category_table.to_string());

        output.push_str(&format!(
            "\n\n{} {}\n{} {}",
            ui::style_text(
                &format!("Estimated monthly ({baseline}):"),
                ui::StyleType::TotalLabel
            ),
            ui::style_text(&format!("{:.2}", self.total_monthly), ui::StyleType::TotalValue),
            ui::style_text(
                &format!("Estimated yearly ({baseline}):"),
                ui::StyleType::TotalLabel
            ),
            ui::style_text(&format!("{:.2}", self.total_yearly()), ui::StyleType::TotalValue),
        ));

        if self.degraded {
            output.push_str(&format!("\n\n{}", ui::degraded_notice()));
        }
        output
    }
}

/// The upcoming subscription due soonest, ties broken by id. Stored dates
/// before `today` are stale and skipped.
fn next_due(subs: &[Subscription], active_only: bool, today: NaiveDate) -> Option<&Subscription> {
    subs.iter()
        .filter(|s| !active_only || s.active)
        .filter(|s| s.next_payment_date >= today)
        .min_by_key(|s| (s.next_payment_date, s.id))
}

/// Prints the spend report and returns it, or `None` when there is nothing
/// to report on.
pub async fn run(
    ledger: &Ledger,
    rate_provider: &(dyn ExchangeRateProvider + Send + Sync),
    baseline: Currency,
    active_only: bool,
    today: NaiveDate,
) -> Result<Option<SpendReport>> {
    let subs = ledger.list().await?;
    if subs.is_empty() {
        println!("No subscriptions found.");
        return Ok(None);
    }

    let snapshot = load_rates(rate_provider, baseline).await;
    let report = analytics::build_report(&subs, &snapshot, active_only);
    println!("{}", report.display_as_table());

    if let Some(sub) = next_due(&subs, active_only, today) {
        println!(
            "\nNext payment: {} on {} ({:.2} {})",
            sub.name,
            ui::format_date(sub.next_payment_date),
            sub.price,
            sub.currency
        );
    }

    let stale = subs.iter().filter(|s| s.next_payment_date < today).count();
    if stale > 0 {
        println!(
            "{}",
            ui::style_text(
                &format!("{stale} payment date(s) are in the past, run `subtrack refresh`"),
                ui::StyleType::Warning
            )
        );
    }
    Ok(Some(report))
}
