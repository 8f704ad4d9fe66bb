//! Next-payment date calculation for recurring subscriptions.
//!
//! Every candidate date is computed from the original start date, never from
//! the previous candidate, so a subscription started on the 31st keeps paying
//! on the last day of short months and returns to the 31st when it can.
use crate::core::subscription::BillingCycle;
use chrono::{DateTime, Datelike, Months, NaiveDate};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("Invalid start date: {0:?}")]
    InvalidDate(String),
    #[error("Invalid billing cycle: {0:?}")]
    InvalidCycle(String),
    #[error("Next payment date is out of range for start date {0}")]
    OutOfRange(NaiveDate),
}

/// Parses a start date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
pub fn parse_start_date(input: &str) -> Result<NaiveDate, RecurrenceError> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| RecurrenceError::InvalidDate(input.to_string()))
}

/// String-level entry point: parses both inputs before computing the date.
pub fn compute_next_payment_date(
    start_date: &str,
    billing_cycle: &str,
    today: NaiveDate,
) -> Result<NaiveDate, RecurrenceError> {
    let start = parse_start_date(start_date)?;
    let cycle: BillingCycle = billing_cycle.parse()?;
    next_payment_date(start, cycle, today)
}

pub fn next_payment_date(
    start: NaiveDate,
    cycle: BillingCycle,
    today: NaiveDate,
) -> Result<NaiveDate, RecurrenceError> {
    advance(start, cycle.months(), today)
}

/// Returns the first date `start + k * step_months` (k >= 0) that is not
/// before `today`.
///
/// A zero-length step is rejected so the search always terminates.
pub fn advance(
    start: NaiveDate,
    step_months: u32,
    today: NaiveDate,
) -> Result<NaiveDate, RecurrenceError> {
    if step_months == 0 {
        return Err(RecurrenceError::InvalidCycle(format!(
            "{step_months} months"
        )));
    }
    if start >= today {
        return Ok(start);
    }

    // Calendar months between the two dates, ignoring the day of month.
    let elapsed = i64::from(today.year() - start.year()) * 12 + i64::from(today.month())
        - i64::from(start.month());
    // Candidates up to this index fall in an earlier month than `today`.
    let mut k = u32::try_from((elapsed / i64::from(step_months) - 1).max(0))
        .map_err(|_| RecurrenceError::OutOfRange(start))?;

    loop {
        let months = k
            .checked_mul(step_months)
            .ok_or(RecurrenceError::OutOfRange(start))?;
        let candidate = start
            .checked_add_months(Months::new(months))
            .ok_or(RecurrenceError::OutOfRange(start))?;
        if candidate >= today {
            debug!("Advanced {start} by {months} months to {candidate}");
            return Ok(candidate);
        }
        k = k.checked_add(1).ok_or(RecurrenceError::OutOfRange(start))?;
    }
}
