//! Settings for the host programs.
//!
//! Read from the JSON file named by `PAYSTATION_CONFIG` (all fields
//! optional), then overridden by `PAYSTATION_DEBIT_AMOUNT` and
//! `PAYSTATION_ROUNDS`.

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use paystation_firmware::{Config, PaymentConfig};
use serde::{Deserialize, Serialize};

pub const CONFIG_VAR: &str = "PAYSTATION_CONFIG";
pub const AMOUNT_VAR: &str = "PAYSTATION_DEBIT_AMOUNT";
pub const ROUNDS_VAR: &str = "PAYSTATION_ROUNDS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub reader: Config,
    pub payment: PaymentConfig,
    /// How many cards to process before exiting
    pub rounds: u32,
    /// Opening balance of the simulated card
    pub card_balance: i32,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            reader: Config::default(),
            payment: PaymentConfig::default(),
            rounds: 1,
            card_balance: 1000,
        }
    }
}

impl TerminalConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_VAR) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(amount) = env_override(AMOUNT_VAR)? {
            config.payment.amount = amount;
        }
        if let Some(rounds) = env_override(ROUNDS_VAR)? {
            config.rounds = rounds;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse settings. Reader timeouts of `0` are refused.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if let Some(name) = config.reader.unbounded_wait() {
            bail!("reader.{name} is 0, which would wait forever");
        }
        Ok(config)
    }
}

fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {name}={value}")),
        Err(_) => Ok(None),
    }
}
