use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::transactions::session_account;
use crate::account::{
    check_loan_capacity, check_loan_eligibility, credited_balance, transfer_funds, validate_amount, verify_closure,
    AccountStore, AccountSummary, LoanScheduler, MovementOrder, ScheduledCredit, TransactionError, TransferReceipt,
};
use crate::audit::{AuditEvent, AuditEventType, AuditTrail};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, RulesConfig};
use crate::security::auth::{AuthResult, Session, TickOutcome};

/// Bank shared between the user-facing loop and the clock driver.
/// Every operation runs under the one lock.
pub type SharedBank = Arc<Mutex<Bank>>;

/// Lock a shared bank, recovering the state if a holder panicked
pub fn lock_bank(bank: &SharedBank) -> MutexGuard<'_, Bank> {
    bank.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of closing an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedAccount {
    pub username: String,
    pub owner: String,
    /// Loans that were still waiting and will never be credited
    pub cancelled_loans: Vec<ScheduledCredit>,
}

/// The ledger and session engine behind the presentation layer
pub struct Bank {
    store: AccountStore,
    session: Session,
    loans: LoanScheduler,
    audit: AuditTrail,
    rules: RulesConfig,
    clock: Arc<dyn Clock>,
}

impl Bank {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(AccountStore::from_seeds(&config.accounts), config, clock)
    }

    pub fn with_store(store: AccountStore, config: &Config, clock: Arc<dyn Clock>) -> Self {
        info!("Bank opened with {} accounts", store.len());
        Self {
            store,
            session: Session::new(config.session.countdown_secs),
            loans: LoanScheduler::new(),
            audit: AuditTrail::new(),
            rules: config.rules.clone(),
            clock,
        }
    }

    pub fn with_system_clock(config: &Config) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn into_shared(self) -> SharedBank {
        Arc::new(Mutex::new(self))
    }

    /// Log in, replacing any current session
    pub fn login(&mut self, username: &str, pin: u32) -> Result<AuthResult, TransactionError> {
        let now = self.clock.now();
        match self.session.login(&self.store, username, pin) {
            Ok(auth) => {
                self.audit.record(AuditEventType::LoginSucceeded, Some(&auth.username), None, now);
                Ok(auth)
            }
            Err(err) => {
                self.audit.record(AuditEventType::LoginFailed, Some(username), None, now);
                Err(err.into())
            }
        }
    }

    /// Log out. Returns the username that was logged in, if any.
    pub fn logout(&mut self) -> Option<String> {
        let username = self.session.logout()?;
        self.audit.record(AuditEventType::Logout, Some(&username), None, self.clock.now());
        Some(username)
    }

    /// Move `amount` from the logged-in account to `receiver`
    pub fn transfer(&mut self, amount: Decimal, receiver: &str) -> Result<TransferReceipt, TransactionError> {
        let now = self.clock.now();
        let result = transfer_funds(&mut self.store, &self.session, receiver, amount, &self.rules, now);

        match &result {
            Ok(receipt) => {
                self.audit.record(
                    AuditEventType::TransferCompleted,
                    Some(&receipt.from),
                    Some(format!("{} to {}", receipt.amount, receipt.to)),
                    now,
                );
            }
            Err(err) => {
                warn!("Transfer of {} to {} rejected: {}", amount, receiver, err);
                let username = self.session.current_username().ok().map(str::to_string);
                self.audit.record(
                    AuditEventType::TransferRejected,
                    username.as_deref(),
                    Some(err.to_string()),
                    now,
                );
            }
        }

        result
    }

    /// Request a loan for the logged-in account.
    ///
    /// An approved loan is not credited right away; it is queued and lands
    /// once `process_scheduled_credits` runs after the configured delay.
    pub fn request_loan(&mut self, amount: Decimal) -> Result<ScheduledCredit, TransactionError> {
        let now = self.clock.now();

        let checked = validate_amount(amount)
            .and_then(|_| session_account(&self.store, &self.session))
            .and_then(|account| {
                check_loan_eligibility(account, amount, &self.rules)?;
                check_loan_capacity(account, amount, self.loans.pending_for(account.username()))?;
                Ok(account.username().to_string())
            });

        let username = match checked {
            Ok(username) => username,
            Err(err) => {
                warn!("Loan of {} rejected: {}", amount, err);
                let username = self.session.current_username().ok().map(str::to_string);
                self.audit.record(AuditEventType::LoanRejected, username.as_deref(), Some(err.to_string()), now);
                return Err(err);
            }
        };

        let credit = self.loans.schedule(&username, amount, now, self.rules.loan_delay_secs);
        self.audit.record(
            AuditEventType::LoanScheduled,
            Some(&username),
            Some(format!("{} due {}", amount, credit.due_at.to_rfc3339())),
            now,
        );

        Ok(credit)
    }

    /// Withdraw a pending loan of the logged-in account.
    ///
    /// Returns `None` when the id does not name a loan of this account that
    /// is still waiting.
    pub fn cancel_loan(&mut self, id: Uuid) -> Result<Option<ScheduledCredit>, TransactionError> {
        let username = session_account(&self.store, &self.session)?.username().to_string();

        if !self.loans.pending_for(&username).any(|c| c.id == id) {
            return Ok(None);
        }

        let cancelled = self.loans.cancel(id);
        if let Some(credit) = &cancelled {
            self.audit.record(AuditEventType::LoanCancelled, Some(&username), Some(credit.id.to_string()), self.clock.now());
        }
        Ok(cancelled)
    }

    /// Close the logged-in account after re-checking its credentials.
    ///
    /// The account leaves the store, its pending loans are cancelled and
    /// the session ends.
    pub fn close_account(&mut self, username: &str, pin: u32) -> Result<ClosedAccount, TransactionError> {
        let now = self.clock.now();
        verify_closure(&self.store, &self.session, username, pin)?;

        let account = self.store.remove(username).ok_or(TransactionError::NoSession)?;
        let cancelled_loans = self.loans.cancel_for_account(username);
        for credit in &cancelled_loans {
            self.audit.record(AuditEventType::LoanCancelled, Some(username), Some(credit.id.to_string()), now);
        }
        self.session.logout();

        self.audit.record(AuditEventType::AccountClosed, Some(username), None, now);
        info!("Account {} closed", username);

        Ok(ClosedAccount {
            username: account.username().to_string(),
            owner: account.owner().to_string(),
            cancelled_loans,
        })
    }

    /// Display state of the logged-in account, computed fresh
    pub fn display_state(&self, order: MovementOrder) -> Result<AccountSummary, TransactionError> {
        let account = session_account(&self.store, &self.session)?;
        Ok(account.summary(order))
    }

    /// Display state of any account in the store
    pub fn account_summary(&self, username: &str, order: MovementOrder) -> Option<AccountSummary> {
        self.store.find(username).map(|a| a.summary(order))
    }

    /// Advance the session countdown by one second
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.session.tick();
        if let TickOutcome::Expired(username) = &outcome {
            self.audit.record(AuditEventType::SessionExpired, Some(username), None, self.clock.now());
        }
        outcome
    }

    /// Apply every loan credit whose delay has elapsed.
    ///
    /// A credit whose account is gone is dropped with a warning. Closing an
    /// account cancels its credits first, so that only happens if the store
    /// was changed some other way. A credit the account can no longer absorb
    /// without overflowing is cancelled.
    pub fn process_scheduled_credits(&mut self) -> Vec<ScheduledCredit> {
        let now = self.clock.now();
        let mut credited = Vec::new();

        for credit in self.loans.take_due(now) {
            let account = match self.store.find_mut(&credit.username) {
                Some(account) => account,
                None => {
                    warn!("Dropping loan {}: account {} no longer exists", credit.id, credit.username);
                    continue;
                }
            };

            // Another credit may have landed since this loan was approved
            if credited_balance(account, credit.amount).is_err() {
                self.audit.record(
                    AuditEventType::LoanCancelled,
                    Some(&credit.username),
                    Some(credit.id.to_string()),
                    now,
                );
                continue;
            }

            account.ledger_mut().append(credit.amount, now);
            self.audit.record(
                AuditEventType::LoanCredited,
                Some(&credit.username),
                Some(credit.amount.to_string()),
                now,
            );
            credited.push(credit);
        }

        credited
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn pending_loans(&self) -> &[ScheduledCredit] {
        self.loans.pending()
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Events recorded since the previous call
    pub fn drain_events(&mut self) -> Vec<AuditEvent> {
        self.audit.drain_new()
    }
}
