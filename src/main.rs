use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use std::process;
use std::time::Duration;

use bankist_ledger::cli::{format, shell};
use bankist_ledger::config::{self, Config};
use bankist_ledger::{Bank, MovementOrder};

/// Bankist - an in-memory banking ledger simulator
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Sets the configuration file
    #[clap(short, long, value_name = "FILE", default_value = "bankist.toml")]
    config: String,

    /// Turn debugging information on
    #[clap(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (default)
    Shell,

    /// List the accounts in the roster
    Accounts,

    /// Log in once and print the account summary
    Summary {
        /// Username
        #[clap(short, long)]
        username: String,

        /// PIN
        #[clap(short, long)]
        pin: u32,

        /// Sort movements by amount
        #[clap(long)]
        sort: bool,
    },
}

fn list_accounts(config: &Config) {
    let bank = Bank::with_system_clock(config);
    println!("{:<10} {:<24} {:>16} {:<8} {:<8}", "USERNAME", "OWNER", "BALANCE", "CURRENCY", "LOCALE");
    for account in bank.store().iter() {
        let balance = bank
            .account_summary(account.username(), MovementOrder::Chronological)
            .map(|summary| summary.balance.to_string())
            .unwrap_or_default();
        println!(
            "{:<10} {:<24} {:>16} {:<8} {:<8}",
            account.username(),
            account.owner(),
            balance,
            account.currency(),
            account.locale()
        );
    }
}

fn print_summary(config: &Config, username: &str, pin: u32, sort: bool) -> anyhow::Result<()> {
    let mut bank = Bank::with_system_clock(config);
    let auth = bank.login(username, pin)?;
    let order = if sort { MovementOrder::AscendingAmount } else { MovementOrder::Chronological };
    let summary = bank.display_state(order)?;

    println!("{}\n", format::welcome_message(&auth.owner));
    println!("{}", format::render_summary(&summary, chrono::Utc::now()));
    Ok(())
}

fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.debug {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    info!("Starting Bankist");

    match config::load_config(&cli.config) {
        Ok(_) => info!("Configuration loaded from {}", cli.config),
        Err(err) => {
            error!("Failed to load configuration: {:#}", err);
            process::exit(1);
        }
    }
    let config = config::get_config();

    let result = match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let bank = Bank::with_system_clock(&config).into_shared();
            shell::run(bank, Duration::from_millis(config.session.tick_interval_ms))
        }
        Commands::Accounts => {
            list_accounts(&config);
            Ok(())
        }
        Commands::Summary { username, pin, sort } => print_summary(&config, &username, pin, sort),
    };

    if let Err(err) = result {
        error!("{:#}", err);
        process::exit(1);
    }
}
