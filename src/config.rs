//! Runtime settings of the state machine, read from a TOML file.

use crate::domain::address::{Address, Condition};
use crate::domain::coin::Coin;
use crate::error::{INVALID_VALUE, Result, wrap};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CHAIN_ID: &str = "paychan-local";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chain_id: String,
    pub fees: FeeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            fees: FeeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Smallest fee accepted. A coin without ticker accepts any currency.
    pub min_fee: Option<Coin>,
    /// Account that receives the fees.
    pub collector: Option<Address>,
}

impl FeeConfig {
    pub fn collector(&self) -> Address {
        self.collector.unwrap_or_else(default_collector)
    }
}

pub fn default_collector() -> Address {
    Condition::new("cash", "collector", b"fees").address()
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw).map_err(|e| wrap(e, format!("config {}", path.as_ref().display())))
    }

    fn validate(&self) -> Result<()> {
        if self.chain_id.is_empty() {
            return Err(INVALID_VALUE.new_error("empty chain id"));
        }
        if let Some(min) = &self.fees.min_fee {
            if !min.is_non_negative() {
                return Err(INVALID_VALUE.new_error("negative minimum fee"));
            }
            // a ticker-less minimum accepts any currency
            if !min.ticker.is_empty() {
                min.validate().map_err(|e| wrap(e, "minimum fee"))?;
            }
        }
        Ok(())
    }
}
