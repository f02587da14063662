//! Balance bookkeeping shared by every handler that moves money.

use crate::domain::address::{ADDRESS_LENGTH, Address};
use crate::domain::coin::Coin;
use crate::domain::ports::KvStore;
use crate::error::{INVALID_VALUE, Result, wrap};
use crate::application::orm::Bucket;
use crate::application::query::QueryRouter;
use tracing::debug;

pub const BUCKET_NAME: &str = "cash";

/// Balances keyed by `(address, ticker)`.
///
/// Every method computes all new balances before writing any of them, so a
/// failed call leaves the store untouched.
#[derive(Clone)]
pub struct Controller {
    bucket: Bucket<Coin>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            bucket: Bucket::new(BUCKET_NAME),
        }
    }

    fn key(addr: &Address, ticker: &str) -> Vec<u8> {
        let mut key = addr.as_bytes().to_vec();
        key.extend_from_slice(ticker.as_bytes());
        key
    }

    /// Balance of `addr` in `ticker`; accounts never funded hold zero.
    pub fn balance(&self, db: &dyn KvStore, addr: &Address, ticker: &str) -> Result<Coin> {
        Ok(self
            .bucket
            .get(db, &Self::key(addr, ticker))?
            .unwrap_or_else(|| Coin::zero(ticker)))
    }

    pub fn balances(&self, db: &dyn KvStore, addr: &Address) -> Result<Vec<Coin>> {
        Ok(self
            .bucket
            .scan(db, addr.as_bytes())?
            .into_iter()
            .map(|(_, coin)| coin)
            .collect())
    }

    /// Every non-zero balance in the store, ordered by address then ticker.
    pub fn all_balances(&self, db: &dyn KvStore) -> Result<Vec<(Address, Coin)>> {
        self.bucket
            .scan(db, &[])?
            .into_iter()
            .map(|(key, coin)| {
                let addr = Address::from_slice(&key[..ADDRESS_LENGTH.min(key.len())])?;
                Ok((addr, coin))
            })
            .collect()
    }

    fn store(&self, db: &mut dyn KvStore, addr: &Address, coin: &Coin) -> Result<()> {
        let key = Self::key(addr, &coin.ticker);
        if coin.is_zero() {
            self.bucket.delete(db, &key);
            return Ok(());
        }
        self.bucket.save(db, &key, coin)
    }

    /// Moves `amount` from `src` to `dest`, all or nothing.
    pub fn move_coins(
        &self,
        db: &mut dyn KvStore,
        src: &Address,
        dest: &Address,
        amount: &Coin,
    ) -> Result<()> {
        amount.validate().map_err(|e| wrap(e, "invalid amount"))?;
        if !amount.is_non_negative() {
            return Err(INVALID_VALUE.new_error("cannot move negative amount"));
        }
        if amount.is_zero() {
            return Ok(());
        }

        let src_balance = self.balance(db, src, &amount.ticker)?;
        let remaining = src_balance.checked_sub(amount)?;
        if !remaining.is_non_negative() {
            return Err(INVALID_VALUE.new_error(format!(
                "insufficient funds: {src} holds {src_balance}, needs {amount}"
            )));
        }
        if src == dest {
            return Ok(());
        }
        let credited = self.balance(db, dest, &amount.ticker)?.checked_add(amount)?;

        self.store(db, src, &remaining)?;
        self.store(db, dest, &credited)?;
        debug!(%src, %dest, %amount, "moved coins");
        Ok(())
    }

    /// Credits `amount` to `dest` out of thin air. Used for genesis balances.
    pub fn issue_coins(&self, db: &mut dyn KvStore, dest: &Address, amount: &Coin) -> Result<()> {
        amount.validate().map_err(|e| wrap(e, "invalid amount"))?;
        if !amount.is_non_negative() {
            return Err(INVALID_VALUE.new_error("cannot issue negative amount"));
        }
        let credited = self.balance(db, dest, &amount.ticker)?.checked_add(amount)?;
        self.store(db, dest, &credited)
    }

    /// Exposes balances for queries under `/wallets`.
    pub fn register_query(&self, router: &mut QueryRouter) {
        self.bucket.register("wallets", router);
    }
}
