use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Write;

use crate::account::AccountSummary;

/// Amount with two decimals followed by the currency code
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    let mut cents = amount.round_dp(2);
    cents.rescale(2);
    format!("{} {}", cents, currency)
}

/// Whole days between two instants, rounded
fn days_between(now: DateTime<Utc>, date: DateTime<Utc>) -> i64 {
    let secs = (now - date).num_seconds() as f64;
    (secs / 86_400.0).round().abs() as i64
}

/// Relative label for recent movements, `DD/MM/YYYY` for older ones
pub fn format_movement_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match days_between(now, date) {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        days @ 2..=7 => format!("{} days ago", days),
        _ => date.format("%d/%m/%Y").to_string(),
    }
}

pub fn welcome_message(owner: &str) -> String {
    let first_name = owner.split_whitespace().next().unwrap_or(owner);
    format!("Welcome back, {}", first_name)
}

/// Render an account summary as a text table, newest row on top
pub fn render_summary(summary: &AccountSummary, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let currency = summary.currency.as_str();

    let _ = writeln!(out, "{} ({})", summary.owner, summary.username);
    let _ = writeln!(out, "Current balance: {}", format_amount(summary.balance, currency));
    let _ = writeln!(out, "As of {}", now.format("%m/%d/%Y"));
    let _ = writeln!(out);

    for (index, movement) in summary.movements.iter().enumerate().rev() {
        let _ = writeln!(
            out,
            "{:>3} {:<10} {:<12} {:>16}",
            index + 1,
            movement.kind().as_str(),
            format_movement_date(movement.timestamp, now),
            format_amount(movement.amount, currency)
        );
    }

    let _ = writeln!(out);
    let _ = write!(
        out,
        "In {}  Out {}  Interest {}",
        format_amount(summary.sum_in, currency),
        format_amount(summary.sum_out, currency),
        format_amount(summary.interest, currency)
    );

    out
}
