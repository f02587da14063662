//! Payment channel entity and the messages that drive its lifecycle.

use crate::domain::address::{Address, Condition, PubKey};
use crate::domain::coin::Coin;
use crate::domain::ports::Model;
use crate::error::{INVALID_CONDITION, MISSING_CONDITION, Result, wrap};
use serde::{Deserialize, Serialize};

pub const MAX_MEMO_SIZE: usize = 128;

/// Funds locked by `src` that `sender_pubkey` may release to `recipient`
/// through signed cumulative payments until `timeout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub src: Address,
    pub sender_pubkey: PubKey,
    pub recipient: Address,
    pub total: Coin,
    /// Block height after which anyone may close the channel.
    pub timeout: i64,
    pub memo: String,
    pub transferred: Coin,
}

impl PaymentChannel {
    pub fn is_exhausted(&self) -> bool {
        self.transferred == self.total
    }

    /// Funds still held in escrow.
    pub fn remaining(&self) -> Result<Coin> {
        self.total.checked_sub(&self.transferred)
    }
}

impl Model for PaymentChannel {
    fn validate(&self) -> Result<()> {
        if self.sender_pubkey.is_empty() {
            return Err(MISSING_CONDITION.new_error("missing sender pubkey"));
        }
        if self.timeout <= 0 {
            return Err(INVALID_CONDITION.new_error(format!(
                "timeout too small: timeout={}",
                self.timeout
            )));
        }
        if self.total.validate().is_err() || !self.total.is_positive() {
            return Err(INVALID_CONDITION.new_error(format!(
                "non positive total: total={}",
                self.total
            )));
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(INVALID_CONDITION.new_error("memo too long"));
        }
        if !self.transferred.same_type(&self.total)
            || !self.transferred.is_non_negative()
            || self.transferred.amount > self.total.amount
        {
            return Err(INVALID_CONDITION.new_error("invalid transferred"));
        }
        Ok(())
    }
}

/// Account that holds the deposit of the channel with the given id.
pub fn escrow_address(channel_id: &[u8]) -> Address {
    Condition::new("paychan", "seq", channel_id).address()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentChannelMsg {
    pub src: Option<Address>,
    pub sender_pubkey: Option<PubKey>,
    pub recipient: Option<Address>,
    pub total: Option<Coin>,
    pub timeout: i64,
    #[serde(default)]
    pub memo: String,
}

impl CreatePaymentChannelMsg {
    pub fn validate(&self) -> Result<()> {
        if self.src.is_none() {
            return Err(MISSING_CONDITION.new_error("missing src"));
        }
        match &self.sender_pubkey {
            Some(key) if !key.is_empty() => {}
            _ => return Err(MISSING_CONDITION.new_error("missing sender pubkey")),
        }
        if self.recipient.is_none() {
            return Err(MISSING_CONDITION.new_error("missing recipient"));
        }
        if self.timeout <= 0 {
            return Err(INVALID_CONDITION.new_error("invalid timeout"));
        }
        let total = self
            .total
            .as_ref()
            .ok_or_else(|| INVALID_CONDITION.new_error("missing total"))?;
        total
            .validate()
            .map_err(|e| wrap(e, "invalid total"))?;
        if !total.is_positive() {
            return Err(INVALID_CONDITION.new_error("non positive total"));
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(INVALID_CONDITION.new_error("memo too long"));
        }
        Ok(())
    }
}

/// The signed part of a transfer. `amount` is the running total ever
/// released by the channel, not the increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub chain_id: String,
    #[serde(with = "crate::domain::hex_bytes")]
    pub channel_id: Vec<u8>,
    pub amount: Coin,
    #[serde(default)]
    pub memo: String,
}

impl Payment {
    /// Bytes covered by the sender signature.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPaymentChannelMsg {
    pub payment: Option<Payment>,
    #[serde(with = "crate::domain::hex_bytes", default)]
    pub signature: Vec<u8>,
}

impl TransferPaymentChannelMsg {
    pub fn validate(&self) -> Result<()> {
        let payment = self
            .payment
            .as_ref()
            .ok_or_else(|| MISSING_CONDITION.new_error("missing payment"))?;
        if payment.chain_id.is_empty() {
            return Err(MISSING_CONDITION.new_error("missing chain id"));
        }
        if payment.channel_id.is_empty() {
            return Err(MISSING_CONDITION.new_error("missing channel id"));
        }
        payment
            .amount
            .validate()
            .map_err(|e| wrap(e, "invalid amount"))?;
        if !payment.amount.is_positive() {
            return Err(INVALID_CONDITION.new_error("non positive amount"));
        }
        if payment.memo.len() > MAX_MEMO_SIZE {
            return Err(INVALID_CONDITION.new_error("memo too long"));
        }
        if self.signature.is_empty() {
            return Err(MISSING_CONDITION.new_error("missing signature"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePaymentChannelMsg {
    #[serde(with = "crate::domain::hex_bytes")]
    pub channel_id: Vec<u8>,
    #[serde(default)]
    pub memo: String,
}

impl ClosePaymentChannelMsg {
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.is_empty() {
            return Err(MISSING_CONDITION.new_error("missing channel id"));
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(INVALID_CONDITION.new_error("memo too long"));
        }
        Ok(())
    }
}
