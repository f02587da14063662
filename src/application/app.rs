use crate::application::batch::BatchDecorator;
use crate::application::fees::FeeDecorator;
use crate::application::kv::{CacheWrap, MemStore};
use crate::application::ledger::Controller;
use crate::application::paychan;
use crate::application::pipeline::{Chain, CheckResult, DeliverResult, Handler};
use crate::application::query::{QueryModel, QueryRouter};
use crate::application::router::Router;
use crate::application::send::SendHandler;
use crate::config::AppConfig;
use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::domain::context::{Authenticator, Context, SignerAuth};
use crate::domain::msg::PATH_SEND;
use crate::domain::ports::{Op, SignatureVerifier, StateBackendBox};
use crate::domain::tx::Tx;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The state machine.
///
/// `App` owns the working state and the durable backend. Check runs on a
/// throwaway overlay; Deliver writes its overlay back only when the whole
/// transaction succeeded; Commit flushes everything delivered since the
/// previous commit.
pub struct App {
    chain_id: String,
    stack: Box<dyn Handler>,
    queries: QueryRouter,
    cash: Controller,
    state: RwLock<MemStore>,
    pending: Mutex<Vec<Op>>,
    backend: StateBackendBox,
}

impl App {
    /// Wires the handler stack and restores the last committed state.
    pub async fn new(
        config: &AppConfig,
        backend: StateBackendBox,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self> {
        let auth: Arc<dyn Authenticator> = Arc::new(SignerAuth);
        let cash = Controller::new();

        let mut router = Router::new();
        router.handle(PATH_SEND, SendHandler::new(auth.clone(), cash.clone()));
        paychan::register_routes(&mut router, auth.clone(), verifier, cash.clone());

        // fees are charged once per transaction, before any batch fan-out
        let stack = Chain::new()
            .with(FeeDecorator::new(
                auth,
                cash.clone(),
                config.fees.min_fee.clone(),
                config.fees.collector(),
            ))
            .with(BatchDecorator::new())
            .handler(router);

        let mut queries = QueryRouter::new();
        cash.register_query(&mut queries);
        paychan::register_query(&mut queries);

        let entries = backend.load().await?;
        info!(
            chain_id = %config.chain_id,
            entries = entries.len(),
            "state restored"
        );

        Ok(Self {
            chain_id: config.chain_id.clone(),
            stack,
            queries,
            cash,
            state: RwLock::new(MemStore::from_entries(entries)),
            pending: Mutex::new(Vec::new()),
            backend,
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn context(&self, height: i64, signers: Vec<Address>) -> Context {
        Context::new(self.chain_id.clone(), height).with_signers(signers)
    }

    /// Runs the Check phase. Nothing it writes survives.
    pub async fn check_tx(
        &self,
        height: i64,
        signers: Vec<Address>,
        tx: &dyn Tx,
    ) -> Result<CheckResult> {
        let ctx = self.context(height, signers);
        let state = self.state.read().await;
        let mut overlay = CacheWrap::new(&*state);
        self.stack.check(&ctx, &mut overlay, tx)
    }

    /// Runs the Deliver phase. A failure leaves the state untouched.
    pub async fn deliver_tx(
        &self,
        height: i64,
        signers: Vec<Address>,
        tx: &dyn Tx,
    ) -> Result<DeliverResult> {
        let ctx = self.context(height, signers);
        let mut state = self.state.write().await;
        let mut overlay = CacheWrap::new(&*state);
        let res = self.stack.deliver(&ctx, &mut overlay, tx)?;

        let ops = overlay.into_ops();
        state.apply(&ops);
        debug!(height, writes = ops.len(), "transaction delivered");
        self.pending.lock().extend(ops);
        Ok(res)
    }

    /// Credits the initial balances. Either every entry is applied or none.
    pub async fn init_genesis(&self, balances: &[(Address, Coin)]) -> Result<()> {
        let mut state = self.state.write().await;
        let mut overlay = CacheWrap::new(&*state);
        for (owner, coin) in balances {
            self.cash.issue_coins(&mut overlay, owner, coin)?;
        }
        let ops = overlay.into_ops();
        state.apply(&ops);
        info!(accounts = balances.len(), "genesis applied");
        self.pending.lock().extend(ops);
        Ok(())
    }

    /// Makes every delivered write durable. Returns the number of writes.
    pub async fn commit(&self) -> Result<usize> {
        let ops = std::mem::take(&mut *self.pending.lock());
        let count = ops.len();
        if count > 0 {
            self.backend.commit(ops).await?;
        }
        info!(writes = count, "state committed");
        Ok(count)
    }

    /// Serves `path[?modifier]` from the registered buckets.
    pub async fn query(&self, path: &str, key: &[u8]) -> Result<Vec<QueryModel>> {
        let state = self.state.read().await;
        self.queries.query(&*state, path, key)
    }

    pub async fn balance(&self, addr: &Address, ticker: &str) -> Result<Coin> {
        let state = self.state.read().await;
        self.cash.balance(&*state, addr, ticker)
    }

    /// Every non-zero balance, ordered by address then ticker.
    pub async fn balances(&self) -> Result<Vec<(Address, Coin)>> {
        let state = self.state.read().await;
        self.cash.all_balances(&*state)
    }
}
