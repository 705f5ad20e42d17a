use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An approved loan waiting to be credited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCredit {
    pub id: Uuid,
    /// Account that receives the credit
    pub username: String,
    pub amount: Decimal,
    pub requested_at: DateTime<Utc>,
    /// Earliest instant the credit may be applied
    pub due_at: DateTime<Utc>,
}

impl ScheduledCredit {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// Queue of deferred loan credits.
///
/// Credits belong to the account they target: closing that account cancels
/// them. Logging out or letting the session expire does not.
#[derive(Debug, Clone, Default)]
pub struct LoanScheduler {
    pending: Vec<ScheduledCredit>,
}

impl LoanScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a credit of `amount` for `username`, due `delay_secs` after `now`
    pub fn schedule(&mut self, username: &str, amount: Decimal, now: DateTime<Utc>, delay_secs: u64) -> ScheduledCredit {
        let delay = Duration::seconds(delay_secs.min(u64::from(u32::MAX)) as i64);
        let credit = ScheduledCredit {
            id: Uuid::new_v4(),
            username: username.to_string(),
            amount,
            requested_at: now,
            due_at: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        info!(
            "Loan {} of {} for {} scheduled for {}",
            credit.id,
            amount,
            username,
            credit.due_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        self.pending.push(credit.clone());
        credit
    }

    /// Remove and return every credit due at `now`, oldest request first
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledCredit> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|c| c.is_due(now));
        self.pending = waiting;

        if !due.is_empty() {
            debug!("{} scheduled credits due", due.len());
        }
        due
    }

    /// Cancel a single credit by id
    pub fn cancel(&mut self, id: Uuid) -> Option<ScheduledCredit> {
        let index = self.pending.iter().position(|c| c.id == id)?;
        let credit = self.pending.remove(index);
        info!("Loan {} for {} cancelled", credit.id, credit.username);
        Some(credit)
    }

    /// Cancel every credit targeting `username`
    pub fn cancel_for_account(&mut self, username: &str) -> Vec<ScheduledCredit> {
        let (cancelled, kept): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|c| c.username == username);
        self.pending = kept;

        if !cancelled.is_empty() {
            info!("Cancelled {} pending loans for {}", cancelled.len(), username);
        }
        cancelled
    }

    pub fn pending(&self) -> &[ScheduledCredit] {
        &self.pending
    }

    pub fn pending_for(&self, username: &str) -> impl Iterator<Item = &ScheduledCredit> {
        let username = username.to_string();
        self.pending.iter().filter(move |c| c.username == username)
    }
}
