use crate::application::ledger::Controller;
use crate::application::pipeline::{CheckResult, Decorator, DeliverResult, Handler};
use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::domain::context::{Authenticator, Context};
use crate::domain::ports::KvStore;
use crate::domain::tx::{FeeInfo, Tx};
use crate::error::{INVALID_VALUE, Result, UNAUTHORIZED, wrap};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Collects the transaction fee before anything else runs.
///
/// The fee is moved from the payer to the collector in both phases; in the
/// Check phase the move only lands in the discarded overlay.
pub struct FeeDecorator {
    auth: Arc<dyn Authenticator>,
    cash: Controller,
    min_fee: Option<Coin>,
    collector: Address,
}

impl FeeDecorator {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        cash: Controller,
        min_fee: Option<Coin>,
        collector: Address,
    ) -> Self {
        Self {
            auth,
            cash,
            min_fee: min_fee.filter(|m| !m.is_zero()),
            collector,
        }
    }

    /// Returns the fee to charge, or `None` when the tx may run for free.
    fn extract_fee(&self, ctx: &Context, tx: &dyn Tx) -> Result<Option<FeeInfo>> {
        let offered = tx.fees().filter(|f| f.fees.as_ref().is_some_and(|c| !c.is_zero()));
        let Some(offered) = offered else {
            return match &self.min_fee {
                None => Ok(None),
                Some(min) => Err(INVALID_VALUE.new_error(format!("fees required: {min}"))),
            };
        };

        let finfo = offered.default_payer(self.auth.main_signer(ctx));
        finfo.validate().map_err(|e| wrap(e, "invalid fee info"))?;
        let (Some(fee), Some(payer)) = (finfo.fees.as_ref(), finfo.payer.as_ref()) else {
            return Err(INVALID_VALUE.new_error("invalid fee info"));
        };

        if let Some(min) = &self.min_fee {
            if !min.ticker.is_empty() && !fee.same_type(min) {
                return Err(INVALID_VALUE.new_error(format!(
                    "fee must be paid in {}, got {}",
                    min.ticker, fee.ticker
                )));
            }
            if fee.amount.cmp(&min.amount) == Ordering::Less {
                return Err(INVALID_VALUE.new_error(format!("fee {fee} below minimum {min}")));
            }
        }

        if !self.auth.has_address(ctx, payer) {
            return Err(UNAUTHORIZED.new_error(format!("fee payer {payer} did not sign")));
        }
        Ok(Some(finfo))
    }

    fn collect(&self, db: &mut dyn KvStore, finfo: &FeeInfo) -> Result<i64> {
        let (Some(payer), Some(fee)) = (&finfo.payer, &finfo.fees) else {
            return Ok(0);
        };
        self.cash
            .move_coins(db, payer, &self.collector, fee)
            .map_err(|e| wrap(e, "cannot pay fee"))?;
        debug!(%payer, %fee, "collected fee");
        Ok(fee.to_units())
    }
}

impl Decorator for FeeDecorator {
    fn check(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<CheckResult> {
        let Some(finfo) = self.extract_fee(ctx, tx)? else {
            return next.check(ctx, db, tx);
        };
        let paid = self.collect(db, &finfo)?;
        let mut res = next.check(ctx, db, tx)?;
        res.gas_payment += paid;
        Ok(res)
    }

    fn deliver(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<DeliverResult> {
        let Some(finfo) = self.extract_fee(ctx, tx)? else {
            return next.deliver(ctx, db, tx);
        };
        self.collect(db, &finfo)?;
        next.deliver(ctx, db, tx)
    }
}
