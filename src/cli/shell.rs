use anyhow::Result;
use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::account::MovementOrder;
use crate::audit::{AuditEvent, AuditEventType};
use crate::bank::{lock_bank, Bank, SharedBank};
use crate::cli::driver::ClockDriver;
use crate::cli::format::{render_summary, welcome_message};
use crate::cli::utils::{print_error, print_header, print_info, print_success, read_line};

const HELP: &str = "\
Commands:
  login <username> <pin>     log in
  logout                     log out
  transfer <to> <amount>     send money to another account
  loan <amount>              request a loan
  cancel <loan-id>           withdraw a loan that has not landed yet
  close <username> <pin>     close the logged-in account
  sort                       toggle sorting movements by amount
  show                       show balance and movements
  timer                      show time left before logout
  help                       show this help
  quit                       leave the shell";

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login { username: String, pin: u32 },
    Logout,
    Transfer { to: String, amount: Decimal },
    Loan { amount: Decimal },
    CancelLoan { id: Uuid },
    Close { username: String, pin: u32 },
    Sort,
    Show,
    Timer,
    Help,
    Quit,
}

fn parse_pin(value: &str) -> Result<u32, String> {
    value.parse().map_err(|_| format!("Invalid PIN: {}", value))
}

fn parse_amount(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|_| format!("Invalid amount: {}", value))
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            ["login", username, pin] => Ok(ShellCommand::Login {
                username: username.to_string(),
                pin: parse_pin(pin)?,
            }),
            ["logout"] => Ok(ShellCommand::Logout),
            ["transfer", to, amount] => Ok(ShellCommand::Transfer {
                to: to.to_string(),
                amount: parse_amount(amount)?,
            }),
            ["loan", amount] => Ok(ShellCommand::Loan { amount: parse_amount(amount)? }),
            ["cancel", id] => Ok(ShellCommand::CancelLoan {
                id: Uuid::parse_str(id).map_err(|_| format!("Invalid loan id: {}", id))?,
            }),
            ["close", username, pin] => Ok(ShellCommand::Close {
                username: username.to_string(),
                pin: parse_pin(pin)?,
            }),
            ["sort"] => Ok(ShellCommand::Sort),
            ["show"] => Ok(ShellCommand::Show),
            ["timer"] => Ok(ShellCommand::Timer),
            ["help"] | ["?"] => Ok(ShellCommand::Help),
            ["quit"] | ["exit"] => Ok(ShellCommand::Quit),
            [] => Err("Empty command".to_string()),
            [other, ..] => Err(format!("Unknown or malformed command: {} (try 'help')", other)),
        }
    }
}

/// What the shell prints after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success(String),
    Failure(String),
    Info(String),
    Quit,
}

/// Per-shell display state
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellState {
    pub order: MovementOrder,
}

fn show(bank: &Bank, state: &ShellState) -> Reply {
    match bank.display_state(state.order) {
        Ok(summary) => Reply::Info(render_summary(&summary, Utc::now())),
        Err(err) => Reply::Failure(err.to_string()),
    }
}

/// Run one command against the bank
pub fn execute(bank: &mut Bank, state: &mut ShellState, command: ShellCommand) -> Reply {
    debug!("Executing shell command {:?}", command);

    match command {
        ShellCommand::Login { username, pin } => match bank.login(&username, pin) {
            Ok(auth) => {
                state.order = MovementOrder::Chronological;
                Reply::Success(format!("{} (session {}s)", welcome_message(&auth.owner), auth.remaining_secs))
            }
            Err(err) => Reply::Failure(err.to_string()),
        },
        ShellCommand::Logout => match bank.logout() {
            Some(username) => Reply::Success(format!("Logged out {}", username)),
            None => Reply::Info("Nobody is logged in".to_string()),
        },
        ShellCommand::Transfer { to, amount } => match bank.transfer(amount, &to) {
            Ok(receipt) => Reply::Success(format!(
                "Sent {} to {}, balance now {}",
                receipt.amount, receipt.to, receipt.sender_balance
            )),
            Err(err) => Reply::Failure(format!("Transaction failed! {}", err)),
        },
        ShellCommand::Loan { amount } => match bank.request_loan(amount) {
            Ok(credit) => Reply::Success(format!(
                "Loan of {} approved, it will be credited at {} (id {})",
                credit.amount,
                credit.due_at.format("%H:%M:%S"),
                credit.id
            )),
            Err(err) => Reply::Failure(err.to_string()),
        },
        ShellCommand::CancelLoan { id } => match bank.cancel_loan(id) {
            Ok(Some(credit)) => Reply::Success(format!("Loan of {} cancelled", credit.amount)),
            Ok(None) => Reply::Failure(format!("No pending loan {}", id)),
            Err(err) => Reply::Failure(err.to_string()),
        },
        ShellCommand::Close { username, pin } => match bank.close_account(&username, pin) {
            Ok(closed) => Reply::Success(format!("Account {} of {} closed", closed.username, closed.owner)),
            Err(err) => Reply::Failure(err.to_string()),
        },
        ShellCommand::Sort => {
            state.order = state.order.toggled();
            show(bank, state)
        }
        ShellCommand::Show => show(bank, state),
        ShellCommand::Timer => match bank.session().countdown_label() {
            Some(label) => Reply::Info(format!("You will be logged out in {}", label)),
            None => Reply::Info("Nobody is logged in".to_string()),
        },
        ShellCommand::Help => Reply::Info(HELP.to_string()),
        ShellCommand::Quit => Reply::Quit,
    }
}

/// Describe an event that completed without a direct command
fn notification(event: &AuditEvent) -> Option<String> {
    let username = event.username.as_deref().unwrap_or("-");
    match event.event_type {
        AuditEventType::SessionExpired => Some(format!("Session of {} expired, please log in again", username)),
        AuditEventType::LoanCredited => Some(format!(
            "Loan of {} credited to {}",
            event.details.as_deref().unwrap_or("?"),
            username
        )),
        _ => None,
    }
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Success(message) => print_success(message),
        Reply::Failure(message) => print_error(message),
        Reply::Info(message) => println!("{}", message),
        Reply::Quit => println!("Bye"),
    }
}

/// Interactive shell with a background clock driving the session countdown
pub fn run(bank: SharedBank, tick_interval: Duration) -> Result<()> {
    let mut driver = ClockDriver::spawn(bank.clone(), tick_interval)?;
    let mut state = ShellState::default();

    print_header("Bankist");
    print_info("Type 'help' for the list of commands");

    loop {
        let events = lock_bank(&bank).drain_events();
        for event in events {
            if let Some(message) = notification(&event) {
                print_info(&message);
            }
        }

        let line = match read_line("bankist> ")? {
            Some(line) => line,
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        let reply = match line.parse::<ShellCommand>() {
            Ok(command) => execute(&mut lock_bank(&bank), &mut state, command),
            Err(message) => Reply::Failure(message),
        };

        print_reply(&reply);
        if reply == Reply::Quit {
            break;
        }
    }

    driver.stop();
    Ok(())
}
