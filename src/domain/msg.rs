use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::domain::paychan::{
    ClosePaymentChannelMsg, CreatePaymentChannelMsg, TransferPaymentChannelMsg,
};
use crate::error::{INVALID_MSG, INVALID_VALUE, Result, wrap};
use serde::{Deserialize, Serialize};

pub const MAX_BATCH_MESSAGES: usize = 10;
pub const MAX_MEMO_SIZE: usize = 128;
pub const MAX_REF_SIZE: usize = 64;

pub const PATH_SEND: &str = "cash/send";
pub const PATH_BATCH: &str = "batch";
pub const PATH_CREATE_PAYMENT_CHANNEL: &str = "paychan/create";
pub const PATH_TRANSFER_PAYMENT_CHANNEL: &str = "paychan/transfer";
pub const PATH_CLOSE_PAYMENT_CHANNEL: &str = "paychan/close";

/// Every message the state machine understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Msg {
    Send(SendMsg),
    Batch(BatchMsg),
    CreatePaymentChannel(CreatePaymentChannelMsg),
    TransferPaymentChannel(TransferPaymentChannelMsg),
    ClosePaymentChannel(ClosePaymentChannelMsg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Single,
    Batch,
}

impl Msg {
    /// Routing key of the handler responsible for this message.
    pub fn path(&self) -> &'static str {
        match self {
            Msg::Send(_) => PATH_SEND,
            Msg::Batch(_) => PATH_BATCH,
            Msg::CreatePaymentChannel(_) => PATH_CREATE_PAYMENT_CHANNEL,
            Msg::TransferPaymentChannel(_) => PATH_TRANSFER_PAYMENT_CHANNEL,
            Msg::ClosePaymentChannel(_) => PATH_CLOSE_PAYMENT_CHANNEL,
        }
    }

    pub fn kind(&self) -> MsgKind {
        match self {
            Msg::Batch(_) => MsgKind::Batch,
            _ => MsgKind::Single,
        }
    }

    /// Structural checks that do not depend on state.
    pub fn validate(&self) -> Result<()> {
        match self {
            Msg::Send(msg) => msg.validate(),
            Msg::Batch(msg) => msg.validate(),
            Msg::CreatePaymentChannel(msg) => msg.validate(),
            Msg::TransferPaymentChannel(msg) => msg.validate(),
            Msg::ClosePaymentChannel(msg) => msg.validate(),
        }
    }
}

/// An ordered group of messages executed all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMsg {
    pub messages: Vec<Msg>,
}

impl BatchMsg {
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(INVALID_MSG.new_error("empty batch"));
        }
        if self.messages.len() > MAX_BATCH_MESSAGES {
            return Err(INVALID_MSG.new_error(format!(
                "transaction is too large: {} messages, max {}",
                self.messages.len(),
                MAX_BATCH_MESSAGES
            )));
        }
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.kind() == MsgKind::Batch {
                return Err(INVALID_MSG.new_error(format!("nested batch at index {i}")));
            }
            msg.validate()
                .map_err(|e| wrap(e, format!("batch message {i}")))?;
        }
        Ok(())
    }
}

/// Moves `amount` from `src` to `dest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMsg {
    pub src: Option<Address>,
    pub dest: Option<Address>,
    pub amount: Option<Coin>,
    #[serde(default)]
    pub memo: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
}

impl SendMsg {
    pub fn validate(&self) -> Result<()> {
        let amount = match &self.amount {
            Some(amount) if amount.is_positive() => amount,
            _ => return Err(INVALID_VALUE.new_error("non-positive amount")),
        };
        amount.validate().map_err(|e| wrap(e, "invalid amount"))?;
        if self.src.is_none() {
            return Err(INVALID_VALUE.new_error("invalid source address"));
        }
        if self.dest.is_none() {
            return Err(INVALID_VALUE.new_error("invalid destination address"));
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(INVALID_VALUE.new_error("memo too long"));
        }
        if self.reference.len() > MAX_REF_SIZE {
            return Err(INVALID_VALUE.new_error("reference too long"));
        }
        Ok(())
    }
}
