use crate::domain::ports::KvStore;
use crate::error::{NOT_FOUND, Result};
use std::collections::HashMap;

/// A raw entry returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryModel {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

pub trait QueryHandler: Send + Sync {
    fn query(&self, db: &dyn KvStore, modifier: &str, key: &[u8]) -> Result<Vec<QueryModel>>;
}

/// Dispatches read-only queries by path. A path may carry a modifier,
/// as in `/paychans?prefix`.
#[derive(Default)]
pub struct QueryRouter {
    routes: HashMap<String, Box<dyn QueryHandler>>,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `/<path>`. Registering a path twice is a
    /// wiring bug and panics.
    pub fn register(&mut self, path: &str, handler: Box<dyn QueryHandler>) {
        let path = format!("/{}", path.trim_start_matches('/'));
        if self.routes.insert(path.clone(), handler).is_some() {
            panic!("query path {path} is already registered");
        }
    }

    pub fn query(&self, db: &dyn KvStore, path: &str, key: &[u8]) -> Result<Vec<QueryModel>> {
        let (route, modifier) = path.split_once('?').unwrap_or((path, ""));
        let handler = self
            .routes
            .get(route)
            .ok_or_else(|| NOT_FOUND.new_error(format!("no query handler for {route}")))?;
        handler.query(db, modifier, key)
    }
}
