//! Bankist: an in-memory banking ledger and session simulator.
//!
//! The core is the account ledger, the transaction rules that move money
//! between accounts, and a session engine that logs an idle user out when
//! its countdown runs out. `cli` is the terminal front end.

pub mod account;
pub mod audit;
pub mod bank;
pub mod cli;
pub mod clock;
pub mod config;
pub mod security;

pub use account::{derive_username, Account, AccountStore, AccountSummary, Movement, MovementOrder, TransactionError};
pub use bank::{lock_bank, Bank, ClosedAccount, SharedBank};
pub use security::auth::{AuthError, Session, SessionState, TickOutcome};
