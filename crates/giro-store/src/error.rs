//! Storage errors

use thiserror::Error;

/// Storage operation error
#[derive(Debug, Error)]
pub enum StorageError {
    /// RocksDB error
    #[error("rocksdb error: {0}")]
    Backend(#[from] rocksdb::Error),

    /// Unknown column family
    #[error("unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// Persisted bytes failed to decode
    #[error("corrupt record in {cf}: {reason}")]
    Corrupt {
        /// Column family the record came from
        cf: &'static str,
        /// Decode failure detail
        reason: String,
    },

    /// Snapshot stack misuse
    #[error("no snapshot to revert to")]
    NoSnapshot,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
