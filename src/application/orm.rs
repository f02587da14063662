//! Typed buckets over the key-value store.

use crate::domain::ports::{KvStore, Model};
use crate::error::{INVALID_MODEL, Result, wrap};
use crate::application::query::{QueryHandler, QueryModel, QueryRouter};
use std::marker::PhantomData;

/// A namespace of entities of one type, keyed by arbitrary bytes.
///
/// Values are stored as JSON under `<name>:<key>`.
pub struct Bucket<T> {
    name: String,
    prefix: Vec<u8>,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Bucket<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            _model: PhantomData,
        }
    }
}

impl<T: Model + 'static> Bucket<T> {
    pub fn new(name: &str) -> Self {
        let mut prefix = name.as_bytes().to_vec();
        prefix.push(b':');
        Self {
            name: name.to_string(),
            prefix,
            _model: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self, name: &str) -> Sequence {
        Sequence {
            key: format!("_s.{}:{}", self.name, name).into_bytes(),
        }
    }

    fn db_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = self.prefix.clone();
        full.extend_from_slice(key);
        full
    }

    /// Loads and validates the entity under `key`. Absence is `Ok(None)`.
    pub fn get(&self, db: &dyn KvStore, key: &[u8]) -> Result<Option<T>> {
        let Some(raw) = db.get(&self.db_key(key)) else {
            return Ok(None);
        };
        let value: T = serde_json::from_slice(&raw)
            .map_err(|e| wrap(e, format!("cannot decode {} entity", self.name)))?;
        value.validate().map_err(|e| {
            INVALID_MODEL.new_error(format!("stored {} entity: {}", self.name, e))
        })?;
        Ok(Some(value))
    }

    /// Validates and stores `value` under `key`.
    pub fn save(&self, db: &mut dyn KvStore, key: &[u8], value: &T) -> Result<()> {
        value.validate()?;
        let raw = serde_json::to_vec(value)?;
        db.set(self.db_key(key), raw);
        Ok(())
    }

    pub fn delete(&self, db: &mut dyn KvStore, key: &[u8]) {
        db.delete(&self.db_key(key));
    }

    /// Every `(key, entity)` whose key starts with `prefix`.
    pub fn scan(&self, db: &dyn KvStore, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        db.prefix_scan(&self.db_key(prefix))
            .into_iter()
            .map(|(k, v)| {
                let value: T = serde_json::from_slice(&v)?;
                Ok((k[self.prefix.len()..].to_vec(), value))
            })
            .collect()
    }

    /// Exposes the bucket for read-only queries under `/<path>`.
    pub fn register(&self, path: &str, router: &mut QueryRouter) {
        router.register(path, Box::new(self.clone()));
    }
}

impl<T: Model + 'static> QueryHandler for Bucket<T> {
    fn query(&self, db: &dyn KvStore, modifier: &str, key: &[u8]) -> Result<Vec<QueryModel>> {
        let models = match modifier {
            "prefix" => db
                .prefix_scan(&self.db_key(key))
                .into_iter()
                .map(|(k, value)| QueryModel {
                    key: k[self.prefix.len()..].to_vec(),
                    value,
                })
                .collect(),
            _ => db
                .get(&self.db_key(key))
                .map(|value| QueryModel {
                    key: key.to_vec(),
                    value,
                })
                .into_iter()
                .collect(),
        };
        Ok(models)
    }
}

/// A monotonically increasing counter stored in the state.
#[derive(Debug, Clone)]
pub struct Sequence {
    key: Vec<u8>,
}

impl Sequence {
    /// Advances the counter and returns the new value as an 8-byte
    /// big-endian key. The first value is 1.
    pub fn next_val(&self, db: &mut dyn KvStore) -> Vec<u8> {
        let current = db
            .get(&self.key)
            .and_then(|raw| <[u8; 8]>::try_from(raw.as_slice()).ok())
            .map(u64::from_be_bytes)
            .unwrap_or(0);
        let next = (current + 1).to_be_bytes().to_vec();
        db.set(self.key.clone(), next.clone());
        next
    }
}
