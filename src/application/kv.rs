use crate::domain::ports::{KvStore, Op};
use std::collections::BTreeMap;

/// Sorted in-memory key-value state.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: entries.into_iter().collect(),
        }
    }

    pub fn apply(&mut self, ops: &[Op]) {
        for op in ops {
            match op {
                Op::Set(key, value) => {
                    self.data.insert(key.clone(), value.clone());
                }
                Op::Delete(key) => {
                    self.data.remove(key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A write buffer layered over a read-only parent.
///
/// Reads see buffered writes first. Dropping the wrap discards everything;
/// [`CacheWrap::into_ops`] hands the buffered writes back for commit.
pub struct CacheWrap<'a> {
    parent: &'a dyn KvStore,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheWrap<'a> {
    pub fn new(parent: &'a dyn KvStore) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Op::Set(key, value),
                None => Op::Delete(key),
            })
            .collect()
    }
}

impl KvStore for CacheWrap<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_scan(prefix).into_iter().collect();
        for (key, value) in self
            .pending
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_prefix_scan() {
        let mut store = MemStore::new();
        store.set(b"a:1".to_vec(), b"x".to_vec());
        store.set(b"a:2".to_vec(), b"y".to_vec());
        store.set(b"b:1".to_vec(), b"z".to_vec());

        let found = store.prefix_scan(b"a:");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, b"a:1".to_vec());
        assert_eq!(found[1].1, b"y".to_vec());
    }

    #[test]
    fn test_cache_wrap_isolation() {
        let mut store = MemStore::new();
        store.set(b"k1".to_vec(), b"v1".to_vec());
        store.set(b"k2".to_vec(), b"v2".to_vec());

        let mut cache = CacheWrap::new(&store);
        cache.set(b"k1".to_vec(), b"changed".to_vec());
        cache.delete(b"k2");
        cache.set(b"k3".to_vec(), b"v3".to_vec());

        assert_eq!(cache.get(b"k1"), Some(b"changed".to_vec()));
        assert_eq!(cache.get(b"k2"), None);
        assert_eq!(cache.prefix_scan(b"k").len(), 2);
        drop(cache);

        assert_eq!(store.get(b"k1"), Some(b"v1".to_vec()));
        assert_eq!(store.get(b"k2"), Some(b"v2".to_vec()));
        assert_eq!(store.get(b"k3"), None);
    }

    #[test]
    fn test_cache_wrap_commit() {
        let mut store = MemStore::new();
        store.set(b"k1".to_vec(), b"v1".to_vec());

        let ops = {
            let mut cache = CacheWrap::new(&store);
            cache.delete(b"k1");
            cache.set(b"k2".to_vec(), b"v2".to_vec());
            cache.into_ops()
        };
        store.apply(&ops);

        assert_eq!(store.get(b"k1"), None);
        assert_eq!(store.get(b"k2"), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_nested_cache_wrap() {
        let store = MemStore::new();
        let mut outer = CacheWrap::new(&store);
        outer.set(b"a".to_vec(), b"1".to_vec());
        let ops = {
            let mut inner = CacheWrap::new(&outer);
            assert_eq!(inner.get(b"a"), Some(b"1".to_vec()));
            inner.set(b"b".to_vec(), b"2".to_vec());
            inner.into_ops()
        };
        assert_eq!(ops, vec![Op::Set(b"b".to_vec(), b"2".to_vec())]);
    }
}
