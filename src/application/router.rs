//! Terminal dispatch from a message path to the handler registered for it.

use crate::application::pipeline::{CheckResult, DeliverResult, Handler};
use crate::domain::context::Context;
use crate::domain::ports::KvStore;
use crate::domain::tx::Tx;
use crate::error::{Result, UNKNOWN_TX_TYPE};
use std::collections::HashMap;
use tracing::debug;

/// Terminal handler that dispatches each message to the handler registered
/// for its path.
#[derive(Default)]
pub struct Router {
    routes: HashMap<&'static str, Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `path`. Routes are wired once at startup, so a
    /// duplicate path panics.
    pub fn handle(&mut self, path: &'static str, handler: impl Handler + 'static) {
        if self.routes.insert(path, Box::new(handler)).is_some() {
            panic!("handler for path {path} is already registered");
        }
    }

    fn route(&self, tx: &dyn Tx) -> Result<&dyn Handler> {
        let path = tx.msg()?.path();
        debug!(path, "routing message");
        self.routes
            .get(path)
            .map(|h| h.as_ref())
            .ok_or_else(|| UNKNOWN_TX_TYPE.new_error(format!("no handler for {path}")))
    }
}

impl Handler for Router {
    fn check(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.route(tx)?.check(ctx, db, tx)
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        self.route(tx)?.deliver(ctx, db, tx)
    }
}
