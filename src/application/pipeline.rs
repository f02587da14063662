//! Two-phase transaction pipeline.
//!
//! A transaction runs through an ordered chain of [`Decorator`]s that ends in
//! a terminal [`Handler`]. Each phase (`check`, `deliver`) walks the same
//! chain; only the store view it is given differs.

use crate::domain::context::Context;
use crate::domain::ports::KvStore;
use crate::domain::tx::Tx;
use crate::error::Result;

/// Outcome of the Check phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub data: Vec<u8>,
    pub log: String,
    pub gas_allocated: i64,
    pub gas_payment: i64,
}

/// A change to the voting power of a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub pub_key: Vec<u8>,
    pub power: i64,
}

/// A key/value pair attached to a delivered transaction for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Tag {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Outcome of the Deliver phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverResult {
    pub data: Vec<u8>,
    pub log: String,
    pub gas_used: i64,
    pub diff: Vec<ValidatorUpdate>,
    pub tags: Vec<Tag>,
}

/// Terminal business logic for a transaction.
pub trait Handler: Send + Sync {
    fn check(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult>;
    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult>;
}

/// A pipeline stage wrapping everything after it.
///
/// A decorator may return its own result, call `next` unchanged, or hand
/// `next` a different view of the transaction.
pub trait Decorator: Send + Sync {
    fn check(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<CheckResult>;

    fn deliver(
        &self,
        ctx: &Context,
        db: &mut dyn KvStore,
        tx: &dyn Tx,
        next: &dyn Handler,
    ) -> Result<DeliverResult>;
}

/// Statically ordered list of decorators, assembled once at startup.
#[derive(Default)]
pub struct Chain {
    decorators: Vec<Box<dyn Decorator>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Stages run in the order they were added.
    pub fn with(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.push(Box::new(decorator));
        self
    }

    /// Closes the chain over its terminal handler.
    pub fn handler(self, handler: impl Handler + 'static) -> Box<dyn Handler> {
        let terminal: Box<dyn Handler> = Box::new(handler);
        self.decorators
            .into_iter()
            .rev()
            .fold(terminal, |next, decorator| {
                Box::new(Stage { decorator, next })
            })
    }
}

struct Stage {
    decorator: Box<dyn Decorator>,
    next: Box<dyn Handler>,
}

impl Handler for Stage {
    fn check(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<CheckResult> {
        self.decorator.check(ctx, db, tx, self.next.as_ref())
    }

    fn deliver(&self, ctx: &Context, db: &mut dyn KvStore, tx: &dyn Tx) -> Result<DeliverResult> {
        self.decorator.deliver(ctx, db, tx, self.next.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::msg::{Msg, SendMsg};
    use crate::domain::tx::Transaction;
    use crate::error::{UNAUTHORIZED, same_class};
    use crate::application::kv::MemStore;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Decorator for Recorder {
        fn check(
            &self,
            ctx: &Context,
            db: &mut dyn KvStore,
            tx: &dyn Tx,
            next: &dyn Handler,
        ) -> Result<CheckResult> {
            self.trace.lock().unwrap().push(self.name);
            let mut res = next.check(ctx, db, tx)?;
            res.gas_allocated += 1;
            Ok(res)
        }

        fn deliver(
            &self,
            ctx: &Context,
            db: &mut dyn KvStore,
            tx: &dyn Tx,
            next: &dyn Handler,
        ) -> Result<DeliverResult> {
            self.trace.lock().unwrap().push(self.name);
            next.deliver(ctx, db, tx)
        }
    }

    struct Deny;

    impl Decorator for Deny {
        fn check(
            &self,
            _: &Context,
            _: &mut dyn KvStore,
            _: &dyn Tx,
            _: &dyn Handler,
        ) -> Result<CheckResult> {
            Err(UNAUTHORIZED.new_error("denied"))
        }

        fn deliver(
            &self,
            _: &Context,
            _: &mut dyn KvStore,
            _: &dyn Tx,
            _: &dyn Handler,
        ) -> Result<DeliverResult> {
            Err(UNAUTHORIZED.new_error("denied"))
        }
    }

    struct Terminal {
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Handler for Terminal {
        fn check(&self, _: &Context, _: &mut dyn KvStore, _: &dyn Tx) -> Result<CheckResult> {
            self.trace.lock().unwrap().push("handler");
            Ok(CheckResult {
                gas_allocated: 10,
                ..Default::default()
            })
        }

        fn deliver(
            &self,
            _: &Context,
            db: &mut dyn KvStore,
            _: &dyn Tx,
        ) -> Result<DeliverResult> {
            self.trace.lock().unwrap().push("handler");
            db.set(b"touched".to_vec(), b"1".to_vec());
            Ok(DeliverResult::default())
        }
    }

    fn tx() -> Transaction {
        Transaction::new(Msg::Send(SendMsg {
            src: None,
            dest: None,
            amount: None,
            memo: String::new(),
            reference: String::new(),
        }))
    }

    #[test]
    fn test_chain_runs_in_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let stack = Chain::new()
            .with(Recorder {
                name: "first",
                trace: trace.clone(),
            })
            .with(Recorder {
                name: "second",
                trace: trace.clone(),
            })
            .handler(Terminal {
                trace: trace.clone(),
            });

        let mut db = MemStore::new();
        let res = stack.check(&Context::default(), &mut db, &tx()).unwrap();
        assert_eq!(res.gas_allocated, 12);
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[test]
    fn test_decorator_short_circuits() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let stack = Chain::new().with(Deny).handler(Terminal {
            trace: trace.clone(),
        });

        let mut db = MemStore::new();
        let err = stack
            .deliver(&Context::default(), &mut db, &tx())
            .unwrap_err();
        assert!(same_class(&err, &UNAUTHORIZED.into()));
        assert!(trace.lock().unwrap().is_empty());
        assert!(db.is_empty());
    }
}
