use crate::application::ledger::Controller;
use crate::application::pipeline::{CheckResult, DeliverResult, Handler, Tag};
use crate::domain::context::{Authenticator, Context};
use crate::domain::msg::{Msg, SendMsg};
use crate::domain::ports::KvStore;
use crate::domain::tx::Tx;
use crate::error::{INVALID_VALUE, Result, UNAUTHORIZED, UNKNOWN_TX_TYPE};
use std::sync::Arc;

/// Gas allocated for a single send.
pub const SEND_TX_COST: i64 = 100;

/// Handles `cash/send`.
pub struct SendHandler {
    auth: Arc<dyn Authenticator>,
    cash: Controller,
}

impl SendHandler {
    pub fn new(auth: Arc<dyn Authenticator>, cash: Controller) -> Self {
        Self { auth, cash }
    }

    fn validate<'a>(&self, ctx: &Context, tx: &'a dyn Tx) -> Result<&'a SendMsg> {
        let Msg::Send(msg) = tx.msg()? else {
            return Err(UNKNOWN_TX_TYPE.new_error("expected send message"));
        };
        msg.validate()?;
        let src = msg
            .src
            .as_ref()
            .ok_or_else(|| INVALID_VALUE.new_error("invalid source address"))?;
        if !self.auth.has_address(ctx, src) {
            return Err(UNAUTHORIZED.new_error(format!("{src} did not sign")));
        }
        Ok(msg)
    }
}

impl Handler for SendHandler {
    fn check(&self, ctx: &Context, _db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.validate(ctx, tx)?;
        Ok(CheckResult {
            gas_allocated: SEND_TX_COST,
            ..Default::default()
        })
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        let msg = self.validate(ctx, tx)?;
        let (Some(src), Some(dest), Some(amount)) = (&msg.src, &msg.dest, &msg.amount) else {
            return Err(INVALID_VALUE.new_error("incomplete send"));
        };
        self.cash.move_coins(db, src, dest, amount)?;

        Ok(DeliverResult {
            tags: vec![Tag::new(src.to_hex(), "s"), Tag::new(dest.to_hex(), "s")],
            ..Default::default()
        })
    }
}
