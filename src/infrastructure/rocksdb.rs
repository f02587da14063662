use crate::domain::ports::{Op, StateBackend};
use crate::error::{INTERNAL, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding the committed application state.
pub const CF_STATE: &str = "state";

/// A persistent state backend using RocksDB.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStateBackend {
    db: Arc<DB>,
}

impl RocksDBStateBackend {
    /// Opens or creates a RocksDB instance at the specified path, making sure
    /// the state column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_state = ColumnFamilyDescriptor::new(CF_STATE, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_state])?;

        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl StateBackend for RocksDBStateBackend {
    async fn load(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self
            .db
            .cf_handle(CF_STATE)
            .ok_or_else(|| INTERNAL.new_error("state column family not found"))?;

        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    async fn commit(&self, ops: Vec<Op>) -> Result<()> {
        let cf = self
            .db
            .cf_handle(CF_STATE)
            .ok_or_else(|| INTERNAL.new_error("state column family not found"))?;

        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                Op::Set(key, value) => batch.put_cf(cf, key, value),
                Op::Delete(key) => batch.delete_cf(cf, key),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}
