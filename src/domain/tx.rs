use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::domain::msg::Msg;
use crate::error::{INVALID_MSG, INVALID_VALUE, Result, wrap};
use serde::{Deserialize, Serialize};

/// What the pipeline sees of a transaction.
///
/// Decorators may hand a different `Tx` to the next stage, for example one
/// that exposes a single message of a batch while sharing everything else.
pub trait Tx: Send + Sync {
    fn msg(&self) -> Result<&Msg>;
    fn fees(&self) -> Option<&FeeInfo>;
}

/// A transaction as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub msg: Option<Msg>,
    #[serde(default)]
    pub fees: Option<FeeInfo>,
}

impl Transaction {
    pub fn new(msg: Msg) -> Self {
        Self {
            msg: Some(msg),
            fees: None,
        }
    }

    pub fn with_fees(mut self, fees: FeeInfo) -> Self {
        self.fees = Some(fees);
        self
    }
}

impl Tx for Transaction {
    fn msg(&self) -> Result<&Msg> {
        self.msg
            .as_ref()
            .ok_or_else(|| INVALID_MSG.new_error("missing message"))
    }

    fn fees(&self) -> Option<&FeeInfo> {
        self.fees.as_ref()
    }
}

/// Fee offered by the transaction. The fee must be present, even if zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInfo {
    #[serde(default)]
    pub payer: Option<Address>,
    pub fees: Option<Coin>,
}

impl FeeInfo {
    /// Fills in `payer` when the transaction did not name one.
    pub fn default_payer(&self, addr: Option<Address>) -> FeeInfo {
        if self.payer.is_some() {
            return self.clone();
        }
        FeeInfo {
            payer: addr,
            fees: self.fees.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fee = self
            .fees
            .as_ref()
            .ok_or_else(|| INVALID_VALUE.new_error("nil fee"))?;
        fee.validate().map_err(|e| wrap(e, "invalid fee"))?;
        if !fee.is_non_negative() {
            return Err(INVALID_VALUE.new_error("negative fee"));
        }
        if self.payer.is_none() {
            return Err(INVALID_VALUE.new_error("invalid payer"));
        }
        Ok(())
    }
}
