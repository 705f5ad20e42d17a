use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context, anyhow};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::RwLock;

/// Session configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Countdown budget after each successful login, in seconds
    pub countdown_secs: u32,
    /// Interval between clock ticks in milliseconds
    pub tick_interval_ms: u64,
}

/// Transaction rule constants
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RulesConfig {
    /// A sender whose balance is at or below this floor cannot transfer
    pub minimum_balance: Decimal,
    /// A loan is approved if some movement exceeds `loan * loan_deposit_ratio`
    pub loan_deposit_ratio: Decimal,
    /// Delay before an approved loan is credited, in seconds
    pub loan_delay_secs: u64,
}

/// A movement in a seeded account
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovementSeed {
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

/// A demo account loaded at startup
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountSeed {
    pub owner: String,
    pub pin: u32,
    /// Interest rate in percent
    pub interest_rate: Decimal,
    pub currency: String,
    pub locale: String,
    pub movements: Vec<MovementSeed>,
}

/// Global application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Session configuration
    pub session: SessionConfig,
    /// Transaction rules
    pub rules: RulesConfig,
    /// Account roster
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 120, // 02:00
            tick_interval_ms: 1000,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            minimum_balance: dec!(2),
            loan_deposit_ratio: dec!(0.1),
            loan_delay_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Bankist".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session: SessionConfig::default(),
            rules: RulesConfig::default(),
            accounts: Vec::new(),
        }
    }
}

fn seed(
    owner: &str,
    pin: u32,
    interest_rate: Decimal,
    currency: &str,
    locale: &str,
    movements: &[(Decimal, &str)],
) -> Result<AccountSeed> {
    let movements = movements
        .iter()
        .map(|(amount, date)| -> Result<MovementSeed> {
            let date = DateTime::parse_from_rfc3339(date)
                .with_context(|| format!("Invalid movement date {} for {}", date, owner))?
                .with_timezone(&Utc);
            Ok(MovementSeed { amount: *amount, date })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AccountSeed {
        owner: owner.to_string(),
        pin,
        interest_rate,
        currency: currency.to_string(),
        locale: locale.to_string(),
        movements,
    })
}

/// The two built-in demo accounts
pub fn demo_accounts() -> Result<Vec<AccountSeed>> {
    Ok(vec![
        seed(
            "Jonas Schmedtmann",
            1111,
            dec!(1.2),
            "EUR",
            "pt-PT",
            &[
                (dec!(200), "2019-11-18T21:31:17.178Z"),
                (dec!(455.23), "2019-12-23T07:42:02.383Z"),
                (dec!(-306.5), "2020-01-28T09:15:04.904Z"),
                (dec!(25000), "2020-04-01T10:17:24.185Z"),
                (dec!(-642.21), "2020-05-08T14:11:59.604Z"),
                (dec!(-133.9), "2020-05-27T17:01:17.194Z"),
                (dec!(79.97), "2020-07-11T23:36:17.929Z"),
                (dec!(1300), "2020-07-12T10:51:36.790Z"),
            ],
        )?,
        seed(
            "Jessica Davis",
            2222,
            dec!(1.5),
            "USD",
            "en-US",
            &[
                (dec!(5000), "2019-11-01T13:15:33.035Z"),
                (dec!(3400), "2019-11-30T09:48:16.867Z"),
                (dec!(-150), "2019-12-25T06:04:23.907Z"),
                (dec!(-790), "2020-01-25T14:18:46.235Z"),
                (dec!(-3210), "2020-02-05T16:33:06.386Z"),
                (dec!(-1000), "2020-04-10T14:43:26.374Z"),
                (dec!(8500), "2020-06-25T18:49:59.371Z"),
                (dec!(-30), "2020-07-26T12:01:20.894Z"),
            ],
        )?,
    ])
}

impl Config {
    /// Default settings with the demo roster
    pub fn demo() -> Result<Self> {
        Ok(Self {
            accounts: demo_accounts()?,
            ..Self::default()
        })
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session.countdown_secs == 0 {
            return Err(anyhow!("session.countdown_secs must be greater than zero"));
        }
        if self.session.tick_interval_ms == 0 {
            return Err(anyhow!("session.tick_interval_ms must be greater than zero"));
        }
        if self.rules.loan_deposit_ratio <= Decimal::ZERO {
            return Err(anyhow!("rules.loan_deposit_ratio must be positive"));
        }
        if let Some(seed) = self.accounts.iter().find(|s| s.movements.iter().any(|m| m.amount.is_zero())) {
            return Err(anyhow!("account {} has a zero movement", seed.owner));
        }
        for seed in &self.accounts {
            let total = seed
                .movements
                .iter()
                .try_fold(Decimal::ZERO, |total, m| total.checked_add(m.amount));
            if total.is_none() {
                return Err(anyhow!("balance of account {} does not fit in a decimal", seed.owner));
            }
        }
        Ok(())
    }
}

// Global configuration instance
lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<()> {
    // Write the defaults out on first run
    if !Path::new(path).exists() {
        let default_config = Config::demo()?;
        save_config(path, &default_config)?;
        return update_config(default_config);
    }

    let mut file = File::open(path).context(format!("Failed to open config file: {}", path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Failed to read config file")?;

    let config: Config = match path.ends_with(".toml") {
        true => toml::from_str(&contents).context("Failed to parse TOML config")?,
        false => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
    };

    config.validate().context(format!("Invalid configuration in {}", path))?;
    update_config(config)
}

/// Save configuration to file
pub fn save_config(path: &str, config: &Config) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    let serialized = match path.ends_with(".toml") {
        true => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        false => serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?,
    };

    std::fs::write(path, serialized).context(format!("Failed to write config to file: {}", path))?;

    Ok(())
}

/// Get a copy of the current config
pub fn get_config() -> Config {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the current config
pub fn update_config(config: Config) -> Result<()> {
    let mut guard = CONFIG.write().map_err(|_| anyhow!("Configuration lock poisoned"))?;
    *guard = config;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_demo_config() {
        let config = Config::demo().unwrap();
        assert_eq!(config.app_name, "Bankist");
        assert_eq!(config.session.countdown_secs, 120);
        assert_eq!(config.rules.minimum_balance, dec!(2));
        assert_eq!(config.rules.loan_deposit_ratio, dec!(0.1));
        assert_eq!(config.rules.loan_delay_secs, 10);
        assert_eq!(config.accounts.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_roster_is_empty() {
        let config = Config::default();
        assert!(config.accounts.is_empty());
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_bad_demo_date_is_an_error() {
        let result = seed("Broken Date", 1, dec!(1), "EUR", "pt-PT", &[(dec!(10), "2020-13-45")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_balance() {
        let mut config = Config::demo().unwrap();
        config.accounts[0].movements[0].amount = Decimal::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_dates_parse() {
        let config = Config::demo().unwrap();
        let first = &config.accounts[0].movements[0];
        assert_eq!(first.date.to_rfc3339(), "2019-11-18T21:31:17.178+00:00");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::demo().unwrap();
        config.session.countdown_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::demo().unwrap();
        config.accounts[1].movements[0].amount = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_and_json_round_trip() {
        let dir = tempdir().unwrap();
        let config = Config::demo().unwrap();

        for name in ["bankist.toml", "bankist.json"] {
            let path = dir.path().join(name);
            let path_str = path.to_str().unwrap();

            save_config(path_str, &config).unwrap();
            let contents = std::fs::read_to_string(&path).unwrap();
            let loaded: Config = if name.ends_with(".toml") {
                toml::from_str(&contents).unwrap()
            } else {
                serde_json::from_str(&contents).unwrap()
            };

            assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("bankist.toml");
        let config_path_str = config_path.to_str().unwrap();

        load_config(config_path_str).unwrap();

        assert!(config_path.exists());
        assert_eq!(get_config().accounts.len(), 2);
    }
}
