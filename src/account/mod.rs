// Account module
// This module holds the account roster, the per-account ledgers,
// and the rules that move money between them.

pub mod ledger;
pub mod loans;
pub mod store;
pub mod transactions;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AccountSeed;
use ledger::Ledger;

pub use ledger::{AccountSummary, Movement, MovementKind, MovementOrder};
pub use loans::{LoanScheduler, ScheduledCredit};
pub use store::AccountStore;
pub use transactions::{
    check_loan_capacity, check_loan_eligibility, credited_balance, transfer_funds, validate_amount, verify_closure,
    TransactionError, TransferReceipt,
};

/// Derive a username from an owner's display name: the lowercased first
/// letter of every word, e.g. "Jonas Schmedtmann" becomes "js".
pub fn derive_username(owner: &str) -> String {
    owner
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A demo bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    owner: String,
    username: String,
    pin: u32,
    ledger: Ledger,
    interest_rate: Decimal,
    currency: String,
    locale: String,
}

impl Account {
    /// Create an account; the username is derived from `owner` up front
    pub fn new(
        owner: impl Into<String>,
        pin: u32,
        interest_rate: Decimal,
        currency: impl Into<String>,
        locale: impl Into<String>,
        ledger: Ledger,
    ) -> Self {
        let owner = owner.into();
        let username = derive_username(&owner);
        Self {
            owner,
            username,
            pin,
            ledger,
            interest_rate,
            currency: currency.into(),
            locale: locale.into(),
        }
    }

    pub fn from_seed(seed: &AccountSeed) -> Self {
        let movements = seed
            .movements
            .iter()
            .map(|m| Movement::new(m.amount, m.date))
            .collect();

        Self::new(
            seed.owner.clone(),
            seed.pin,
            seed.interest_rate,
            seed.currency.clone(),
            seed.locale.clone(),
            Ledger::from_movements(movements),
        )
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plain numeric comparison; PINs are demo data, not secrets
    pub fn verify_pin(&self, pin: u32) -> bool {
        self.pin == pin
    }

    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn balance(&self) -> Decimal {
        self.ledger.balance()
    }

    pub fn summary(&self, order: MovementOrder) -> AccountSummary {
        AccountSummary::from_account(self, order)
    }
}
