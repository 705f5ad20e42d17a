use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Account, AccountStore, ScheduledCredit};
use crate::config::RulesConfig;
use crate::security::auth::{AuthError, Session};

/// Transaction processing errors
///
/// Every variant is user facing and recoverable. An operation that returns
/// one of these has not touched any ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Username or PIN did not match
    #[error("Username or PIN is incorrect")]
    AuthenticationFailed,
    /// No account is logged in
    #[error("No active session, please log in and try again")]
    NoSession,
    /// Amount is zero or negative
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    /// Balance does not cover the amount
    #[error("The balance is not enough to make the transaction")]
    InsufficientFunds,
    /// Balance is at or below the floor that keeps an account active
    #[error("Minimum balance of {0} is required to keep the account active")]
    BelowMinimumBalance(Decimal),
    /// Recipient is the logged-in account
    #[error("Cannot transfer money to your own account")]
    SelfTransfer,
    /// Recipient username does not resolve
    #[error("Recipient account {0} does not exist")]
    UnknownRecipient(String),
    /// No deposit is large enough to back the loan
    #[error("Loan amount is too large")]
    LoanTooLarge,
}

impl From<AuthError> for TransactionError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AuthenticationFailed => TransactionError::AuthenticationFailed,
            AuthError::NoSession => TransactionError::NoSession,
        }
    }
}

/// Record of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub debited_at: DateTime<Utc>,
    pub credited_at: DateTime<Utc>,
    /// Sender balance after the transfer
    pub sender_balance: Decimal,
}

/// Resolve the logged-in account. A session whose account has left the
/// store counts as no session.
pub fn session_account<'a>(store: &'a AccountStore, session: &Session) -> Result<&'a Account, TransactionError> {
    let username = session.current_username()?;
    store.find(username).ok_or_else(|| {
        warn!("Session references missing account {}", username);
        TransactionError::NoSession
    })
}

/// Transfer `amount` from the logged-in account to `receiver`.
///
/// Guards run in a fixed order and the first failing one wins. Both
/// movements are appended while holding mutable access to both accounts,
/// so either both land or neither does.
pub fn transfer_funds(
    store: &mut AccountStore,
    session: &Session,
    receiver: &str,
    amount: Decimal,
    rules: &RulesConfig,
    now: DateTime<Utc>,
) -> Result<TransferReceipt, TransactionError> {
    debug!("Initiating transfer of {} to {}", amount, receiver);

    validate_amount(amount)?;

    let sender = session_account(store, session)?;
    let balance = sender.balance();

    if balance < amount {
        return Err(TransactionError::InsufficientFunds);
    }

    // Applies even when the balance covers the amount
    if balance <= rules.minimum_balance {
        return Err(TransactionError::BelowMinimumBalance(rules.minimum_balance));
    }

    if receiver == sender.username() {
        return Err(TransactionError::SelfTransfer);
    }

    let sender_name = sender.username().to_string();

    let (from, to) = store
        .find_pair_mut(&sender_name, receiver)
        .ok_or_else(|| TransactionError::UnknownRecipient(receiver.to_string()))?;
    credited_balance(to, amount)?;

    from.ledger_mut().append(-amount, now);
    to.ledger_mut().append(amount, now);

    let receipt = TransferReceipt {
        from: sender_name,
        to: receiver.to_string(),
        amount,
        debited_at: now,
        credited_at: now,
        sender_balance: from.balance(),
    };

    info!("Transfer of {} from {} to {} completed", amount, receipt.from, receipt.to);

    Ok(receipt)
}

/// Reject zero and negative amounts
pub fn validate_amount(amount: Decimal) -> Result<(), TransactionError> {
    if amount <= Decimal::ZERO {
        return Err(TransactionError::InvalidAmount);
    }
    Ok(())
}

/// Balance `account` would reach after receiving `amount`.
///
/// A credit whose result does not fit in a `Decimal` is an invalid amount.
pub fn credited_balance(account: &Account, amount: Decimal) -> Result<Decimal, TransactionError> {
    account
        .ledger()
        .checked_balance()
        .and_then(|balance| balance.checked_add(amount))
        .ok_or_else(|| {
            warn!("Crediting {} to {} would overflow its balance", amount, account.username());
            TransactionError::InvalidAmount
        })
}

/// Approve a loan request against the account's history.
///
/// The loan is allowed when at least one movement is strictly larger than
/// `amount * loan_deposit_ratio`.
pub fn check_loan_eligibility(account: &Account, amount: Decimal, rules: &RulesConfig) -> Result<(), TransactionError> {
    let threshold = amount.checked_mul(rules.loan_deposit_ratio).ok_or(TransactionError::LoanTooLarge)?;
    if !account.ledger().has_movement_above(threshold) {
        debug!("Loan of {} rejected for {}: no movement above {}", amount, account.username(), threshold);
        return Err(TransactionError::LoanTooLarge);
    }

    Ok(())
}

/// Make sure `account` can still absorb `amount` once every loan already
/// waiting for it has landed.
pub fn check_loan_capacity<'a>(
    account: &Account,
    amount: Decimal,
    pending: impl IntoIterator<Item = &'a ScheduledCredit>,
) -> Result<(), TransactionError> {
    let outstanding = pending
        .into_iter()
        .try_fold(amount, |total, credit| total.checked_add(credit.amount))
        .ok_or(TransactionError::InvalidAmount)?;

    credited_balance(account, outstanding).map(|_| ())
}

/// Confirm the credentials typed to close the logged-in account
pub fn verify_closure(store: &AccountStore, session: &Session, username: &str, pin: u32) -> Result<(), TransactionError> {
    let account = session_account(store, session)?;

    if username != account.username() || !account.verify_pin(pin) {
        return Err(TransactionError::AuthenticationFailed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ledger::{Ledger, Movement};
    use crate::config::Config;
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;

    struct TestBank {
        store: AccountStore,
        session: Session,
        rules: RulesConfig,
    }

    #[fixture]
    fn bank() -> TestBank {
        let config = Config::demo().unwrap();
        let store = AccountStore::from_seeds(&config.accounts);
        let mut session = Session::new(config.session.countdown_secs);
        session.login(&store, "js", 1111).unwrap();

        TestBank { store, session, rules: config.rules }
    }

    fn balances(store: &AccountStore) -> Vec<Decimal> {
        store.iter().map(|a| a.balance()).collect()
    }

    #[rstest]
    fn test_transfer_moves_money(mut bank: TestBank) {
        let js_before = bank.store.find("js").unwrap().balance();
        let jd_before = bank.store.find("jd").unwrap().balance();

        let receipt = transfer_funds(&mut bank.store, &bank.session, "jd", dec!(500), &bank.rules, Utc::now()).unwrap();

        let js = bank.store.find("js").unwrap();
        let jd = bank.store.find("jd").unwrap();
        assert_eq!(js.balance(), js_before - dec!(500));
        assert_eq!(jd.balance(), jd_before + dec!(500));
        assert_eq!(js.ledger().len(), 9);
        assert_eq!(jd.ledger().len(), 9);
        assert_eq!(js.ledger().movements().last().unwrap().amount, dec!(-500));
        assert_eq!(jd.ledger().movements().last().unwrap().amount, dec!(500));
        assert_eq!(receipt.sender_balance, js.balance());
    }

    #[rstest]
    #[case(dec!(0), TransactionError::InvalidAmount)]
    #[case(dec!(-10), TransactionError::InvalidAmount)]
    #[case(dec!(1000000), TransactionError::InsufficientFunds)]
    fn test_transfer_amount_guards(mut bank: TestBank, #[case] amount: Decimal, #[case] expected: TransactionError) {
        let before = balances(&bank.store);

        let result = transfer_funds(&mut bank.store, &bank.session, "jd", amount, &bank.rules, Utc::now());

        assert_eq!(result.unwrap_err(), expected);
        assert_eq!(balances(&bank.store), before);
    }

    #[rstest]
    fn test_self_transfer_rejected(mut bank: TestBank) {
        let before = balances(&bank.store);

        let result = transfer_funds(&mut bank.store, &bank.session, "js", dec!(1), &bank.rules, Utc::now());

        assert_eq!(result.unwrap_err(), TransactionError::SelfTransfer);
        assert_eq!(balances(&bank.store), before);
    }

    #[rstest]
    fn test_unknown_recipient(mut bank: TestBank) {
        let result = transfer_funds(&mut bank.store, &bank.session, "zz", dec!(1), &bank.rules, Utc::now());

        assert_eq!(result.unwrap_err(), TransactionError::UnknownRecipient("zz".to_string()));
        assert_eq!(bank.store.find("js").unwrap().ledger().len(), 8);
    }

    #[test]
    fn test_minimum_balance_floor() {
        let rules = RulesConfig::default();
        let store_accounts = vec![
            Account::new("Low Balance", 1, dec!(1), "EUR", "pt-PT", Ledger::from_movements(vec![Movement::new(dec!(2), Utc::now())])),
            Account::new("Other Person", 2, dec!(1), "EUR", "pt-PT", Ledger::new()),
        ];
        let mut store = AccountStore::new(store_accounts);
        let mut session = Session::new(120);
        session.login(&store, "lb", 1).unwrap();

        // Balance covers the amount but sits on the floor
        let result = transfer_funds(&mut store, &session, "op", dec!(1), &rules, Utc::now());

        assert_eq!(result.unwrap_err(), TransactionError::BelowMinimumBalance(dec!(2)));
        assert_eq!(store.find("lb").unwrap().balance(), dec!(2));
        assert!(store.find("op").unwrap().ledger().is_empty());
    }

    #[rstest]
    fn test_transfer_requires_session(mut bank: TestBank) {
        bank.session.logout();

        let result = transfer_funds(&mut bank.store, &bank.session, "jd", dec!(10), &bank.rules, Utc::now());

        assert_eq!(result.unwrap_err(), TransactionError::NoSession);
    }

    #[rstest]
    #[case(dec!(1000), true)]
    #[case(dec!(249999), true)]
    #[case(dec!(250000), false)]
    #[case(dec!(300000), false)]
    fn test_loan_eligibility(bank: TestBank, #[case] amount: Decimal, #[case] approved: bool) {
        let account = bank.store.find("js").unwrap();

        let result = check_loan_eligibility(account, amount, &bank.rules);

        if approved {
            assert!(result.is_ok(), "loan of {} should be approved", amount);
        } else {
            assert_eq!(result.unwrap_err(), TransactionError::LoanTooLarge);
        }
    }

    #[rstest]
    #[case(dec!(0), false)]
    #[case(dec!(-5), false)]
    #[case(dec!(0.01), true)]
    fn test_validate_amount(#[case] amount: Decimal, #[case] valid: bool) {
        assert_eq!(validate_amount(amount).is_ok(), valid);
    }

    #[test]
    fn test_loan_capacity_counts_pending_credits() {
        let account = Account::new(
            "Rich Person",
            1,
            dec!(1),
            "EUR",
            "pt-PT",
            Ledger::from_movements(vec![Movement::new(Decimal::MAX - dec!(100), Utc::now())]),
        );
        let mut loans = crate::account::LoanScheduler::new();

        assert!(check_loan_capacity(&account, dec!(60), loans.pending()).is_ok());
        loans.schedule("rp", dec!(60), Utc::now(), 10);

        assert_eq!(
            check_loan_capacity(&account, dec!(60), loans.pending()).unwrap_err(),
            TransactionError::InvalidAmount
        );
        assert!(check_loan_capacity(&account, dec!(40), loans.pending()).is_ok());
    }

    #[test]
    fn test_transfer_rejects_receiver_overflow() {
        let rules = RulesConfig::default();
        let mut store = AccountStore::new(vec![
            Account::new("Big Sender", 1, dec!(1), "EUR", "pt-PT", Ledger::from_movements(vec![Movement::new(dec!(1000), Utc::now())])),
            Account::new("Full Receiver", 2, dec!(1), "EUR", "pt-PT", Ledger::from_movements(vec![Movement::new(Decimal::MAX, Utc::now())])),
        ]);
        let mut session = Session::new(120);
        session.login(&store, "bs", 1).unwrap();

        let result = transfer_funds(&mut store, &session, "fr", dec!(10), &rules, Utc::now());

        assert_eq!(result.unwrap_err(), TransactionError::InvalidAmount);
        assert_eq!(store.find("bs").unwrap().ledger().len(), 1);
        assert_eq!(store.find("fr").unwrap().balance(), Decimal::MAX);
    }

    #[rstest]
    #[case("js", 1111, true)]
    #[case("js", 2222, false)]
    #[case("jd", 2222, false)]
    fn test_verify_closure(bank: TestBank, #[case] username: &str, #[case] pin: u32, #[case] ok: bool) {
        let result = verify_closure(&bank.store, &bank.session, username, pin);

        if ok {
            assert!(result.is_ok());
        } else {
            assert_eq!(result.unwrap_err(), TransactionError::AuthenticationFailed);
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(TransactionError::BelowMinimumBalance(dec!(2)).to_string(), "Minimum balance of 2 is required to keep the account active");
        assert_eq!(TransactionError::from(AuthError::NoSession), TransactionError::NoSession);
    }
}
