//! Payment channel handlers.
//!
//! A channel locks `total` in an escrow account derived from the channel id.
//! Transfers carry a cumulative amount signed by the sender, so only the
//! difference to what was already released moves to the recipient.

use crate::application::ledger::Controller;
use crate::application::orm::{Bucket, Sequence};
use crate::application::pipeline::{CheckResult, DeliverResult, Handler};
use crate::application::query::QueryRouter;
use crate::application::router::Router;
use crate::domain::context::{Authenticator, Context};
use crate::domain::coin::Coin;
use crate::domain::msg::{
    Msg, PATH_CLOSE_PAYMENT_CHANNEL, PATH_CREATE_PAYMENT_CHANNEL, PATH_TRANSFER_PAYMENT_CHANNEL,
};
use crate::domain::paychan::{
    ClosePaymentChannelMsg, CreatePaymentChannelMsg, PaymentChannel, TransferPaymentChannelMsg,
    escrow_address,
};
use crate::domain::ports::{KvStore, SignatureVerifier};
use crate::domain::tx::Tx;
use crate::error::{
    INVALID_AMOUNT, INVALID_CHAIN_ID, INVALID_CONDITION, INVALID_SIGNATURE, MISSING_CONDITION,
    NOT_ALLOWED, NOT_FOUND, Result, UNAUTHORIZED, UNKNOWN_TX_TYPE, wrap,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

pub const CREATE_PAYMENT_CHANNEL_COST: i64 = 300;
pub const TRANSFER_PAYMENT_CHANNEL_COST: i64 = 5;

const BUCKET_NAME: &str = "paychan";

/// Channels keyed by an 8-byte big-endian sequence id.
#[derive(Clone)]
pub struct PaymentChannelBucket {
    bucket: Bucket<PaymentChannel>,
    ids: Sequence,
}

impl Default for PaymentChannelBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentChannelBucket {
    pub fn new() -> Self {
        let bucket = Bucket::new(BUCKET_NAME);
        let ids = bucket.sequence("id");
        Self { bucket, ids }
    }

    /// Stores a new channel under the next free id and returns that id.
    pub fn create(&self, db: &mut dyn KvStore, pc: &PaymentChannel) -> Result<Vec<u8>> {
        let id = self.ids.next_val(db);
        self.bucket.save(db, &id, pc)?;
        Ok(id)
    }

    pub fn get_payment_channel(&self, db: &dyn KvStore, id: &[u8]) -> Result<PaymentChannel> {
        self.bucket
            .get(db, id)?
            .ok_or_else(|| NOT_FOUND.new_error(format!("payment channel {}", hex::encode(id))))
    }

    pub fn save(&self, db: &mut dyn KvStore, id: &[u8], pc: &PaymentChannel) -> Result<()> {
        self.bucket.save(db, id, pc)
    }

    pub fn delete(&self, db: &mut dyn KvStore, id: &[u8]) {
        self.bucket.delete(db, id)
    }

    pub fn scan(&self, db: &dyn KvStore) -> Result<Vec<(Vec<u8>, PaymentChannel)>> {
        self.bucket.scan(db, &[])
    }
}

/// Exposes channels for queries under `/paychans`.
pub fn register_query(router: &mut QueryRouter) {
    PaymentChannelBucket::new().bucket.register("paychans", router);
}

/// Wires the three channel handlers into `router`.
pub fn register_routes(
    router: &mut Router,
    auth: Arc<dyn Authenticator>,
    verifier: Arc<dyn SignatureVerifier>,
    cash: Controller,
) {
    let bucket = PaymentChannelBucket::new();
    router.handle(
        PATH_CREATE_PAYMENT_CHANNEL,
        CreatePaymentChannelHandler {
            auth: auth.clone(),
            bucket: bucket.clone(),
            cash: cash.clone(),
        },
    );
    router.handle(
        PATH_TRANSFER_PAYMENT_CHANNEL,
        TransferPaymentChannelHandler {
            verifier,
            bucket: bucket.clone(),
            cash: cash.clone(),
        },
    );
    router.handle(
        PATH_CLOSE_PAYMENT_CHANNEL,
        ClosePaymentChannelHandler { auth, bucket, cash },
    );
}

pub struct CreatePaymentChannelHandler {
    auth: Arc<dyn Authenticator>,
    bucket: PaymentChannelBucket,
    cash: Controller,
}

impl CreatePaymentChannelHandler {
    fn validate<'a>(&self, ctx: &Context, tx: &'a dyn Tx) -> Result<&'a CreatePaymentChannelMsg> {
        let Msg::CreatePaymentChannel(msg) = tx.msg()? else {
            return Err(UNKNOWN_TX_TYPE.new_error("expected create payment channel message"));
        };
        msg.validate()?;
        if msg.timeout <= ctx.height() {
            return Err(INVALID_CONDITION.new_error("timeout in the past"));
        }
        match &msg.src {
            Some(src) if self.auth.has_address(ctx, src) => Ok(msg),
            Some(src) => Err(UNAUTHORIZED.new_error(format!("{src} did not sign"))),
            None => Err(MISSING_CONDITION.new_error("missing src")),
        }
    }
}

impl Handler for CreatePaymentChannelHandler {
    fn check(&self, ctx: &Context, _db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.validate(ctx, tx)
            .map_err(|e| wrap(e, "invalid message"))?;
        Ok(CheckResult {
            gas_allocated: CREATE_PAYMENT_CHANNEL_COST,
            ..Default::default()
        })
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        let msg = self
            .validate(ctx, tx)
            .map_err(|e| wrap(e, "invalid message"))?;
        let (Some(src), Some(sender_pubkey), Some(recipient), Some(total)) =
            (&msg.src, &msg.sender_pubkey, &msg.recipient, &msg.total)
        else {
            return Err(MISSING_CONDITION.new_error("incomplete payment channel"));
        };

        let pc = PaymentChannel {
            src: *src,
            sender_pubkey: sender_pubkey.clone(),
            recipient: *recipient,
            total: total.clone(),
            timeout: msg.timeout,
            memo: msg.memo.clone(),
            transferred: Coin::zero(total.ticker.clone()),
        };
        let id = self
            .bucket
            .create(db, &pc)
            .map_err(|e| wrap(e, "cannot create in bucket"))?;

        self.cash
            .move_coins(db, src, &escrow_address(&id), total)
            .map_err(|e| wrap(e, "cannot move coins"))?;
        info!(id = %hex::encode(&id), %src, %total, "payment channel created");

        Ok(DeliverResult {
            data: id,
            ..Default::default()
        })
    }
}

pub struct TransferPaymentChannelHandler {
    verifier: Arc<dyn SignatureVerifier>,
    bucket: PaymentChannelBucket,
    cash: Controller,
}

impl TransferPaymentChannelHandler {
    fn validate<'a>(
        &self,
        ctx: &Context,
        db: &dyn KvStore,
        tx: &'a dyn Tx,
    ) -> Result<(&'a TransferPaymentChannelMsg, PaymentChannel)> {
        let Msg::TransferPaymentChannel(msg) = tx.msg()? else {
            return Err(UNKNOWN_TX_TYPE.new_error("expected transfer payment channel message"));
        };
        msg.validate()?;
        let payment = msg
            .payment
            .as_ref()
            .ok_or_else(|| MISSING_CONDITION.new_error("missing payment"))?;

        if payment.chain_id != ctx.chain_id() {
            return Err(INVALID_CHAIN_ID.new_error(payment.chain_id.clone()));
        }

        let pc = self.bucket.get_payment_channel(db, &payment.channel_id)?;

        let raw = payment
            .sign_bytes()
            .map_err(|e| wrap(e, "serialize payment"))?;
        if !self.verifier.verify(&pc.sender_pubkey, &raw, &msg.signature) {
            return Err(INVALID_SIGNATURE.into());
        }

        let invalid = || INVALID_AMOUNT.new_error(payment.amount.to_string());
        if !payment.amount.same_type(&pc.total) {
            return Err(invalid());
        }
        if payment.amount.compare(&pc.total)? == Ordering::Greater {
            return Err(invalid());
        }
        // The amount is a running total, so every transfer has to exceed the
        // last one.
        if payment.amount.compare(&pc.transferred)? != Ordering::Greater {
            return Err(invalid());
        }
        Ok((msg, pc))
    }
}

impl Handler for TransferPaymentChannelHandler {
    fn check(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.validate(ctx, db, tx)
            .map_err(|e| wrap(e, "invalid message"))?;
        Ok(CheckResult {
            gas_allocated: TRANSFER_PAYMENT_CHANNEL_COST,
            ..Default::default()
        })
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        let (msg, mut pc) = self.validate(ctx, db, tx)?;
        let payment = msg
            .payment
            .as_ref()
            .ok_or_else(|| MISSING_CONDITION.new_error("missing payment"))?;

        let delta = payment.amount.checked_sub(&pc.transferred)?;
        if delta.is_zero() {
            return Err(INVALID_AMOUNT.new_error(payment.amount.to_string()));
        }

        let escrow = escrow_address(&payment.channel_id);
        self.cash.move_coins(db, &escrow, &pc.recipient, &delta)?;

        pc.transferred = payment.amount.clone();
        pc.memo = payment.memo.clone();
        debug!(
            id = %hex::encode(&payment.channel_id),
            %delta,
            transferred = %pc.transferred,
            "payment channel transfer"
        );

        if pc.is_exhausted() {
            self.bucket.delete(db, &payment.channel_id);
            info!(id = %hex::encode(&payment.channel_id), "payment channel exhausted");
            return Ok(DeliverResult::default());
        }
        self.bucket.save(db, &payment.channel_id, &pc)?;
        Ok(DeliverResult::default())
    }
}

pub struct ClosePaymentChannelHandler {
    auth: Arc<dyn Authenticator>,
    bucket: PaymentChannelBucket,
    cash: Controller,
}

impl ClosePaymentChannelHandler {
    fn validate<'a>(&self, tx: &'a dyn Tx) -> Result<&'a ClosePaymentChannelMsg> {
        let Msg::ClosePaymentChannel(msg) = tx.msg()? else {
            return Err(UNKNOWN_TX_TYPE.new_error("expected close payment channel message"));
        };
        msg.validate()?;
        Ok(msg)
    }
}

impl Handler for ClosePaymentChannelHandler {
    fn check(&self, _ctx: &Context, _db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.validate(tx)?;
        Ok(CheckResult::default())
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        let msg = self.validate(tx)?;
        let pc = self.bucket.get_payment_channel(db, &msg.channel_id)?;
        let id = hex::encode(&msg.channel_id);

        // Nothing left in escrow, anyone may clean up.
        if pc.is_exhausted() {
            self.bucket.delete(db, &msg.channel_id);
            info!(%id, "payment channel closed");
            return Ok(DeliverResult::default());
        }

        if pc.timeout > ctx.height() && !self.auth.has_address(ctx, &pc.recipient) {
            return Err(NOT_ALLOWED.new_error("not recipient"));
        }

        let leftover = pc.remaining()?;
        self.cash
            .move_coins(db, &escrow_address(&msg.channel_id), &pc.src, &leftover)?;
        self.bucket.delete(db, &msg.channel_id);
        info!(%id, refunded = %leftover, "payment channel closed");
        Ok(DeliverResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::kv::MemStore;
    use crate::domain::address::{Address, PubKey};
    use crate::domain::context::SignerAuth;
    use crate::domain::paychan::Payment;
    use crate::domain::tx::Transaction;
    use crate::infrastructure::crypto::{KeyPair, Secp256k1Verifier};
    use rust_decimal_macros::dec;

    const CHAIN: &str = "test-chain";

    struct Fixture {
        router: Router,
        cash: Controller,
        db: MemStore,
        sender: KeyPair,
        recipient: KeyPair,
    }

    struct RejectAll;

    impl SignatureVerifier for RejectAll {
        fn verify(&self, _: &PubKey, _: &[u8], _: &[u8]) -> bool {
            false
        }
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_verifier(Arc::new(Secp256k1Verifier))
        }

        fn with_verifier(verifier: Arc<dyn SignatureVerifier>) -> Self {
            let cash = Controller::new();
            let mut router = Router::new();
            register_routes(&mut router, Arc::new(SignerAuth), verifier, cash.clone());
            let sender = KeyPair::from_secret_bytes(&[1u8; 32]).unwrap();
            let recipient = KeyPair::from_secret_bytes(&[2u8; 32]).unwrap();
            let mut db = MemStore::new();
            cash.issue_coins(&mut db, &sender.address(), &Coin::new(dec!(1000), "IOV"))
                .unwrap();
            Self {
                router,
                cash,
                db,
                sender,
                recipient,
            }
        }

        fn ctx(&self, height: i64, signer: Address) -> Context {
            Context::new(CHAIN, height).with_signers(vec![signer])
        }

        fn balance(&self, addr: &Address) -> Coin {
            self.cash.balance(&self.db, addr, "IOV").unwrap()
        }

        fn create(&mut self, total: Coin, timeout: i64) -> Vec<u8> {
            let tx = Transaction::new(Msg::CreatePaymentChannel(CreatePaymentChannelMsg {
                src: Some(self.sender.address()),
                sender_pubkey: Some(self.sender.pubkey()),
                recipient: Some(self.recipient.address()),
                total: Some(total),
                timeout,
                memo: "lunch".into(),
            }));
            let ctx = self.ctx(1, self.sender.address());
            self.router.deliver(&ctx, &mut self.db, &tx).unwrap().data
        }

        fn transfer_tx(&self, id: &[u8], amount: Coin, signer: &KeyPair) -> Transaction {
            let payment = Payment {
                chain_id: CHAIN.into(),
                channel_id: id.to_vec(),
                amount,
                memo: "tip".into(),
            };
            let signature = signer.sign(&payment.sign_bytes().unwrap());
            Transaction::new(Msg::TransferPaymentChannel(TransferPaymentChannelMsg {
                payment: Some(payment),
                signature,
            }))
        }

        fn transfer(&mut self, id: &[u8], amount: Coin) -> Result<DeliverResult> {
            let tx = self.transfer_tx(id, amount, &self.sender.clone());
            // anyone may submit a signed payment
            let ctx = self.ctx(2, self.recipient.address());
            self.router.deliver(&ctx, &mut self.db, &tx)
        }

        fn close(&mut self, id: &[u8], height: i64, signer: Address) -> Result<DeliverResult> {
            let tx = Transaction::new(Msg::ClosePaymentChannel(ClosePaymentChannelMsg {
                channel_id: id.to_vec(),
                memo: String::new(),
            }));
            let ctx = self.ctx(height, signer);
            self.router.deliver(&ctx, &mut self.db, &tx)
        }
    }

    #[test]
    fn test_create_locks_funds_in_escrow() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);
        assert_eq!(id, 1u64.to_be_bytes().to_vec());
        assert_eq!(f.balance(&escrow_address(&id)), Coin::new(dec!(100), "IOV"));
        assert_eq!(f.balance(&f.sender.address()), Coin::new(dec!(900), "IOV"));

        let pc = PaymentChannelBucket::new()
            .get_payment_channel(&f.db, &id)
            .unwrap();
        assert_eq!(pc.transferred, Coin::zero("IOV"));
        assert_eq!(pc.memo, "lunch");

        let second = f.create(Coin::new(dec!(1), "IOV"), 10);
        assert_eq!(second, 2u64.to_be_bytes().to_vec());
    }

    #[test]
    fn test_create_rejects_past_timeout_and_foreign_source() {
        let mut f = Fixture::new();
        let msg = CreatePaymentChannelMsg {
            src: Some(f.sender.address()),
            sender_pubkey: Some(f.sender.pubkey()),
            recipient: Some(f.recipient.address()),
            total: Some(Coin::new(dec!(10), "IOV")),
            timeout: 5,
            memo: String::new(),
        };
        let tx = Transaction::new(Msg::CreatePaymentChannel(msg));

        let late = f.ctx(5, f.sender.address());
        let err = f.router.check(&late, &mut f.db, &tx).unwrap_err();
        assert!(err.is(INVALID_CONDITION));

        let stranger = f.ctx(1, f.recipient.address());
        let err = f.router.deliver(&stranger, &mut f.db, &tx).unwrap_err();
        assert!(err.is(UNAUTHORIZED));

        let ok = f.ctx(1, f.sender.address());
        let res = f.router.check(&ok, &mut f.db, &tx).unwrap();
        assert_eq!(res.gas_allocated, CREATE_PAYMENT_CHANNEL_COST);
    }

    #[test]
    fn test_cumulative_transfers_drain_channel() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);

        f.transfer(&id, Coin::new(dec!(40), "IOV")).unwrap();
        assert_eq!(f.balance(&f.recipient.address()), Coin::new(dec!(40), "IOV"));
        let pc = PaymentChannelBucket::new()
            .get_payment_channel(&f.db, &id)
            .unwrap();
        assert_eq!(pc.transferred, Coin::new(dec!(40), "IOV"));
        assert_eq!(pc.memo, "tip");

        f.transfer(&id, Coin::new(dec!(100), "IOV")).unwrap();
        assert_eq!(f.balance(&f.recipient.address()), Coin::new(dec!(100), "IOV"));
        assert!(f.balance(&escrow_address(&id)).is_zero());

        let err = f.transfer(&id, Coin::new(dec!(40), "IOV")).unwrap_err();
        assert!(err.is(NOT_FOUND));
    }

    #[test]
    fn test_transfer_must_increase() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);
        f.transfer(&id, Coin::new(dec!(40), "IOV")).unwrap();

        for amount in [dec!(40), dec!(10), dec!(100.5)] {
            let err = f.transfer(&id, Coin::new(amount, "IOV")).unwrap_err();
            assert!(err.is(INVALID_AMOUNT), "{amount}: {err}");
        }
        let err = f.transfer(&id, Coin::new(dec!(50), "ETH")).unwrap_err();
        assert!(err.is(INVALID_AMOUNT));
        assert_eq!(f.balance(&f.recipient.address()), Coin::new(dec!(40), "IOV"));
    }

    #[test]
    fn test_transfer_checks_signature_and_chain() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);
        let ctx = f.ctx(2, f.recipient.address());

        let forged = f.transfer_tx(&id, Coin::new(dec!(10), "IOV"), &f.recipient.clone());
        let err = f.router.check(&ctx, &mut f.db, &forged).unwrap_err();
        assert!(err.is(INVALID_SIGNATURE));

        let tx = f.transfer_tx(&id, Coin::new(dec!(10), "IOV"), &f.sender.clone());
        let other_chain = Context::new("other-chain", 2);
        let err = f.router.deliver(&other_chain, &mut f.db, &tx).unwrap_err();
        assert!(err.is(INVALID_CHAIN_ID));

        let res = f.router.check(&ctx, &mut f.db, &tx).unwrap();
        assert_eq!(res.gas_allocated, TRANSFER_PAYMENT_CHANNEL_COST);
    }

    #[test]
    fn test_transfer_uses_injected_verifier() {
        let mut f = Fixture::with_verifier(Arc::new(RejectAll));
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);

        let err = f.transfer(&id, Coin::new(dec!(10), "IOV")).unwrap_err();
        assert!(err.is(INVALID_SIGNATURE));
        assert!(f.balance(&f.recipient.address()).is_zero());
        assert_eq!(f.balance(&escrow_address(&id)), Coin::new(dec!(100), "IOV"));
    }

    #[test]
    fn test_close_before_timeout_only_by_recipient() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);
        f.transfer(&id, Coin::new(dec!(30), "IOV")).unwrap();

        let err = f.close(&id, 5, f.sender.address()).unwrap_err();
        assert!(err.is(NOT_ALLOWED));

        f.close(&id, 5, f.recipient.address()).unwrap();
        assert_eq!(f.balance(&f.sender.address()), Coin::new(dec!(970), "IOV"));
        assert!(f.balance(&escrow_address(&id)).is_zero());
        assert!(f.close(&id, 5, f.recipient.address()).unwrap_err().is(NOT_FOUND));
    }

    #[test]
    fn test_close_after_timeout_by_anyone() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(100), "IOV"), 10);
        let stranger = Address::from_slice(&[9u8; 20]).unwrap();

        f.close(&id, 10, stranger).unwrap();
        assert_eq!(f.balance(&f.sender.address()), Coin::new(dec!(1000), "IOV"));
    }

    #[test]
    fn test_stored_channel_keeps_sender_key() {
        let mut f = Fixture::new();
        let id = f.create(Coin::new(dec!(5), "IOV"), 10);
        let (key, pc) = PaymentChannelBucket::new()
            .scan(&f.db)
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(key, id);
        assert_eq!(pc.sender_pubkey, PubKey::new(f.sender.pubkey().as_bytes().to_vec()));
    }
}
