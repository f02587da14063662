use crate::domain::address::PubKey;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A sorted key-value view of the application state.
///
/// Implementations are not safe against interleaved mutation by two
/// transactions; callers hold exclusive access for the span of one
/// transaction.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// An entity that can be persisted through a bucket.
///
/// `validate` runs on every load and before every save.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    fn validate(&self) -> Result<()>;
}

/// Checks a signature made by the holder of `pubkey` over `message`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, pubkey: &PubKey, message: &[u8], signature: &[u8]) -> bool;
}

/// Durable storage for committed state.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Every committed entry, used to rebuild the in-memory state at startup.
    async fn load(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Applies the writes of one commit atomically.
    async fn commit(&self, ops: Vec<Op>) -> Result<()>;
}

pub type StateBackendBox = Box<dyn StateBackend>;
