use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single signed, timestamped entry in an account ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Positive for incoming money, negative for outgoing
    pub amount: Decimal,
    /// Creation time of the movement
    pub timestamp: DateTime<Utc>,
}

impl Movement {
    pub fn new(amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { amount, timestamp }
    }

    pub fn kind(&self) -> MovementKind {
        if self.amount > Decimal::ZERO {
            MovementKind::Deposit
        } else {
            MovementKind::Withdrawal
        }
    }
}

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
}

impl MovementKind {
    pub fn as_str(&self) -> &str {
        match self {
            MovementKind::Deposit => "deposit",
            MovementKind::Withdrawal => "withdrawal",
        }
    }
}

/// Ordering of a movement listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementOrder {
    /// Insertion order, which is chronological order
    #[default]
    Chronological,
    /// Smallest amount first
    AscendingAmount,
}

impl MovementOrder {
    pub fn toggled(self) -> Self {
        match self {
            MovementOrder::Chronological => MovementOrder::AscendingAmount,
            MovementOrder::AscendingAmount => MovementOrder::Chronological,
        }
    }
}

/// Append-only list of movements belonging to one account.
///
/// Every aggregate is recomputed from the stored movements on each call;
/// nothing is cached, so the balance can never drift from the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    movements: Vec<Movement>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_movements(movements: Vec<Movement>) -> Self {
        Self { movements }
    }

    /// Append a movement. Sign and magnitude are validated by the caller.
    pub fn append(&mut self, amount: Decimal, timestamp: DateTime<Utc>) {
        self.movements.push(Movement::new(amount, timestamp));
    }

    /// Movements in insertion order
    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    /// Sum of all movement amounts.
    ///
    /// Saturates at the `Decimal` bounds; `checked_balance` tells whether
    /// the exact sum is representable.
    pub fn balance(&self) -> Decimal {
        saturating_sum(self.movements.iter().map(|m| m.amount))
    }

    /// Exact sum of all movement amounts, `None` if it overflows
    pub fn checked_balance(&self) -> Option<Decimal> {
        self.movements
            .iter()
            .try_fold(Decimal::ZERO, |total, m| total.checked_add(m.amount))
    }

    /// Sum of incoming movements
    pub fn sum_in(&self) -> Decimal {
        saturating_sum(self.movements.iter().filter(|m| m.amount > Decimal::ZERO).map(|m| m.amount))
    }

    /// Absolute value of the sum of outgoing movements
    pub fn sum_out(&self) -> Decimal {
        saturating_sum(self.movements.iter().filter(|m| m.amount < Decimal::ZERO).map(|m| m.amount)).abs()
    }

    /// Interest accrued on deposits at `rate_percent`.
    ///
    /// This is a projection only and is never credited to the ledger.
    pub fn interest(&self, rate_percent: Decimal) -> Decimal {
        saturating_sum(
            self.movements
                .iter()
                .filter(|m| m.amount > Decimal::ZERO)
                .map(|m| m.amount.saturating_mul(rate_percent) / Decimal::ONE_HUNDRED),
        )
    }

    /// Whether any movement is strictly larger than `threshold`
    pub fn has_movement_above(&self, threshold: Decimal) -> bool {
        self.movements.iter().any(|m| m.amount > threshold)
    }

    /// A copy of the movements in the requested order; storage is untouched
    pub fn view(&self, order: MovementOrder) -> Vec<Movement> {
        let mut view = self.movements.clone();
        if order == MovementOrder::AscendingAmount {
            view.sort_by(|a, b| a.amount.cmp(&b.amount));
        }
        view
    }
}

fn saturating_sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Derived display state of one account, computed fresh on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub owner: String,
    pub username: String,
    pub currency: String,
    pub locale: String,
    pub balance: Decimal,
    pub sum_in: Decimal,
    pub sum_out: Decimal,
    pub interest: Decimal,
    pub order: MovementOrder,
    pub movements: Vec<Movement>,
}

impl AccountSummary {
    pub fn from_account(account: &super::Account, order: MovementOrder) -> Self {
        let ledger = account.ledger();
        let summary = Self {
            owner: account.owner().to_string(),
            username: account.username().to_string(),
            currency: account.currency().to_string(),
            locale: account.locale().to_string(),
            balance: ledger.balance(),
            sum_in: ledger.sum_in(),
            sum_out: ledger.sum_out(),
            interest: ledger.interest(account.interest_rate()),
            order,
            movements: ledger.view(order),
        };

        debug!(
            "Recomputed summary for {}: balance {} over {} movements",
            summary.username,
            summary.balance,
            ledger.len()
        );

        summary
    }
}
