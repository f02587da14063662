use crate::domain::ports::{Op, StateBackend};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory state backend.
///
/// Uses `Arc<RwLock<BTreeMap<..>>>` so clones share the committed state,
/// which lets tests inspect exactly what was made durable.
#[derive(Default, Clone)]
pub struct InMemoryStateBackend {
    committed: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStateBackend {
    /// Creates a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.committed.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.committed.read().await.len()
    }
}

#[async_trait]
impl StateBackend for InMemoryStateBackend {
    async fn load(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let committed = self.committed.read().await;
        Ok(committed
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn commit(&self, ops: Vec<Op>) -> Result<()> {
        let mut committed = self.committed.write().await;
        for op in ops {
            match op {
                Op::Set(key, value) => {
                    committed.insert(key, value);
                }
                Op::Delete(key) => {
                    committed.remove(&key);
                }
            }
        }
        Ok(())
    }
}
