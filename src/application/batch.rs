//! Fans a batch message out into one pipeline call per member message.
//!
//! This is only a binding into the pipeline; there is little business logic
//! here beyond combining the results.

use crate::application::pipeline::{CheckResult, Decorator, DeliverResult, Handler};
use crate::domain::context::Context;
use crate::domain::msg::{BatchMsg, Msg};
use crate::domain::ports::KvStore;
use crate::domain::tx::{FeeInfo, Tx};
use crate::error::{INVALID_VALUE, Result};
use tracing::debug;

/// The transaction as seen by the stages after the batch decorator: same
/// fees and signers, one member message.
struct BatchTx<'a> {
    tx: &'a dyn Tx,
    msg: &'a Msg,
}

impl Tx for BatchTx<'_> {
    fn msg(&self) -> Result<&Msg> {
        Ok(self.msg)
    }

    fn fees(&self) -> Option<&FeeInfo> {
        self.tx.fees()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDecorator;

impl BatchDecorator {
    pub fn new() -> Self {
        Self
    }
}

fn as_batch(msg: &Msg) -> Option<&BatchMsg> {
    match msg {
        Msg::Batch(batch) => Some(batch),
        _ => None,
    }
}

impl Decorator for BatchDecorator {
    fn check(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<CheckResult> {
        let Some(batch) = as_batch(tx.msg()?) else {
            return next.check(ctx, db, tx);
        };
        batch.validate()?;
        debug!(messages = batch.messages.len(), "checking batch");

        let mut checks = Vec::with_capacity(batch.messages.len());
        for msg in &batch.messages {
            checks.push(next.check(ctx, db, &BatchTx { tx, msg })?);
        }
        Ok(combine_checks(checks))
    }

    fn deliver(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<DeliverResult> {
        let Some(batch) = as_batch(tx.msg()?) else {
            return next.deliver(ctx, db, tx);
        };
        batch.validate()?;
        debug!(messages = batch.messages.len(), "delivering batch");

        let mut delivers = Vec::with_capacity(batch.messages.len());
        for msg in &batch.messages {
            delivers.push(next.deliver(ctx, db, &BatchTx { tx, msg })?);
        }
        Ok(combine_delivers(delivers))
    }
}

fn combine_checks(checks: Vec<CheckResult>) -> CheckResult {
    let mut datas = Vec::with_capacity(checks.len());
    let mut logs = Vec::with_capacity(checks.len());
    let mut res = CheckResult::default();
    for check in checks {
        datas.push(check.data);
        logs.push(check.log);
        res.gas_allocated += check.gas_allocated;
        res.gas_payment += check.gas_payment;
    }
    res.data = encode_byte_list(&datas);
    res.log = logs.join("\n");
    res
}

fn combine_delivers(delivers: Vec<DeliverResult>) -> DeliverResult {
    let mut datas = Vec::with_capacity(delivers.len());
    let mut logs = Vec::with_capacity(delivers.len());
    let mut res = DeliverResult::default();
    for deliver in delivers {
        datas.push(deliver.data);
        logs.push(deliver.log);
        res.gas_used += deliver.gas_used;
        res.diff.extend(deliver.diff);
        res.tags.extend(deliver.tags);
    }
    res.data = encode_byte_list(&datas);
    res.log = logs.join("\n");
    res
}

/// Encodes a list of byte strings, each prefixed with its u32 big-endian
/// length.
pub fn encode_byte_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.iter().map(|i| i.len() + 4).sum());
    for item in items {
        out.extend_from_slice(&(item.len() as u32).to_be_bytes());
        out.extend_from_slice(item);
    }
    out
}

pub fn decode_byte_list(mut data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut items = Vec::new();
    while !data.is_empty() {
        let (len, rest) = data
            .split_first_chunk::<4>()
            .ok_or_else(|| INVALID_VALUE.new_error("truncated length prefix"))?;
        let len = u32::from_be_bytes(*len) as usize;
        if rest.len() < len {
            return Err(INVALID_VALUE.new_error("truncated list element"));
        }
        let (item, rest) = rest.split_at(len);
        items.push(item.to_vec());
        data = rest;
    }
    Ok(items)
}
