//! RocksDB wrapper

use crate::error::{StorageError, StorageResult};
use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options,
    WriteBatch,
};
use std::path::Path;
use std::sync::Arc;

/// Column family names
pub mod cf {
    /// `holder \x00 denom → amount`
    pub const BALANCES: &str = "balances";
    /// `denom → amount` (total issued minus burned per issuer)
    pub const OUTSTANDING: &str = "outstanding";
    /// `tx_hash → VoteStatus`
    pub const VOTES: &str = "votes";
    /// `command_id → MintCommand`
    pub const COMMANDS: &str = "commands";
    /// `"current"` and `"v" ++ version BE → ValidatorSet`
    pub const VALIDATORS: &str = "validators";
    /// `cycle_id BE → NettingCycle`
    pub const CYCLES: &str = "cycles";
    /// `id BE → AuditEntry`
    pub const AUDIT: &str = "audit";
    /// `timestamp BE ++ id BE → ()` secondary index
    pub const AUDIT_BY_TIME: &str = "audit_by_time";
    /// `kind \x00 id BE → ()` secondary index
    pub const AUDIT_BY_KIND: &str = "audit_by_kind";
    /// Scalar bookkeeping (audit sequence, next cycle id, last netting block)
    pub const META: &str = "meta";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[
    cf::BALANCES,
    cf::OUTSTANDING,
    cf::VOTES,
    cf::COMMANDS,
    cf::VALIDATORS,
    cf::CYCLES,
    cf::AUDIT,
    cf::AUDIT_BY_TIME,
    cf::AUDIT_BY_KIND,
    cf::META,
];

type RocksDb = DBWithThreadMode<MultiThreaded>;

/// Database tuning options
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Create the database if missing
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size
    pub write_buffer_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 512,
            write_buffer_size: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// RocksDB wrapper with column-family access
pub struct Database {
    db: Arc<RocksDb>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl Database {
    /// Open (or create) the database at `path` with default options
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(path, DbConfig::default())
    }

    /// Open with explicit tuning options
    pub fn open_with_config(path: impl AsRef<Path>, config: DbConfig) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = RocksDb::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn handle(&self, cf_name: &str) -> StorageResult<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::UnknownColumnFamily(cf_name.to_string()))
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let cf = self.handle(cf_name)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    /// Put a value into a column family
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let cf = self.handle(cf_name)?;
        Ok(self.db.put_cf(&cf, key, value)?)
    }

    /// Delete a key from a column family
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> StorageResult<()> {
        let cf = self.handle(cf_name)?;
        Ok(self.db.delete_cf(&cf, key)?)
    }

    /// Collect every `(key, value)` in a column family, in key order
    pub fn scan(&self, cf_name: &str) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (k, v) = item?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Collect `(key, value)` pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.handle(cf_name)?;
        let mut out = Vec::new();
        let mode = IteratorMode::From(prefix, Direction::Forward);
        for item in self.db.iterator_cf(&cf, mode) {
            let (k, v) = item?;
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Create an empty write batch
    pub fn batch(&self) -> WriteBatchExt {
        WriteBatchExt {
            inner: WriteBatch::default(),
        }
    }

    /// Atomically apply a write batch
    pub fn write_batch(&self, batch: WriteBatchExt) -> StorageResult<()> {
        Ok(self.db.write(batch.inner)?)
    }

    /// Put into a batch, resolving the column family
    pub fn batch_put(
        &self,
        batch: &mut WriteBatchExt,
        cf_name: &str,
        key: &[u8],
        value: &[u8],
    ) -> StorageResult<()> {
        let cf = self.handle(cf_name)?;
        batch.inner.put_cf(&cf, key, value);
        Ok(())
    }

    /// Delete within a batch, resolving the column family
    pub fn batch_delete(
        &self,
        batch: &mut WriteBatchExt,
        cf_name: &str,
        key: &[u8],
    ) -> StorageResult<()> {
        let cf = self.handle(cf_name)?;
        batch.inner.delete_cf(&cf, key);
        Ok(())
    }
}

/// Owned write batch handed back to [`Database::write_batch`]
pub struct WriteBatchExt {
    inner: WriteBatch,
}
