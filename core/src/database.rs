//! Abstract storage interface (spec.md §6 "Database (abstract)") plus one
//! concrete backend. The teacher keeps a trait-object storage abstraction
//! (`Storage` in `daemon/src/core/storage/mod.rs`) with swappable backends
//! (rocksdb, sled); this crate keeps the same shape at a much smaller
//! surface — only the operations spec.md actually names — with `sled` (a
//! dependency the teacher already carries for its wallet/daemon crates) as
//! the sole concrete implementation.

use async_trait::async_trait;

use ledger_common::error::StorageError;

/// A single persisted record's key: either its content hash or its
/// sequence number, both of which are valid lookup keys for a pool
/// (spec.md §6 `get(key) | get(seq_no) -> bytes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey<'a> {
    Hash(&'a [u8; 32]),
    Sequence(u64),
}

#[async_trait]
pub trait Database: Send + Sync {
    fn is_open(&self) -> bool;

    /// Persists `value` under both its content-hash key and its sequence
    /// number, so later lookups can use either (spec.md §6).
    async fn put(&self, key: &[u8; 32], seq_no: u64, value: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, key: RecordKey<'_>) -> Result<Option<Vec<u8>>, StorageError>;

    async fn remove(&self, key: &[u8; 32]) -> Result<(), StorageError>;

    /// Applies a batch of puts atomically where the backend supports it.
    async fn write_batch(&self, items: Vec<(([u8; 32], u64), Vec<u8>)>) -> Result<(), StorageError>;

    /// The most recent error seen by this handle (spec.md §7
    /// "Database errors surface through last_error() on the DB handle").
    fn last_error(&self) -> Option<String>;
}

/// sled-backed implementation. Three trees: `by_hash`, `by_sequence` (an
/// index holding the hash for a given sequence), and a raw value tree keyed
/// by hash — mirroring the "key = poolHash, seq_no = sequence" contract
/// from spec.md §4.4 without requiring cross-tree transactions (spec.md §6:
/// "no cross-pool transactions required").
pub struct SledDatabase {
    values: sled::Tree,
    by_sequence: sled::Tree,
    last_error: std::sync::Mutex<Option<String>>,
}

impl SledDatabase {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| StorageError::IoError(e.to_string()))?;
        let values = db.open_tree("values").map_err(|e| StorageError::IoError(e.to_string()))?;
        let by_sequence = db
            .open_tree("by_sequence")
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        Ok(SledDatabase {
            values,
            by_sequence,
            last_error: std::sync::Mutex::new(None),
        })
    }

    fn record_error(&self, err: &StorageError) {
        *self.last_error.lock().expect("last_error mutex poisoned") = Some(err.to_string());
    }
}

#[async_trait]
impl Database for SledDatabase {
    fn is_open(&self) -> bool {
        true
    }

    async fn put(&self, key: &[u8; 32], seq_no: u64, value: &[u8]) -> Result<(), StorageError> {
        let result = (|| -> Result<(), StorageError> {
            self.values.insert(key, value).map_err(|e| StorageError::IoError(e.to_string()))?;
            self.by_sequence
                .insert(seq_no.to_be_bytes(), key.as_slice())
                .map_err(|e| StorageError::IoError(e.to_string()))?;
            Ok(())
        })();
        if let Err(err) = &result {
            self.record_error(err);
        }
        result
    }

    async fn get(&self, key: RecordKey<'_>) -> Result<Option<Vec<u8>>, StorageError> {
        let hash_key = match key {
            RecordKey::Hash(hash) => Some(hash.to_vec()),
            RecordKey::Sequence(seq) => self
                .by_sequence
                .get(seq.to_be_bytes())
                .map_err(|e| StorageError::IoError(e.to_string()))?
                .map(|ivec| ivec.to_vec()),
        };
        let Some(hash_key) = hash_key else { return Ok(None) };
        self.values
            .get(hash_key)
            .map(|opt| opt.map(|ivec| ivec.to_vec()))
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    async fn remove(&self, key: &[u8; 32]) -> Result<(), StorageError> {
        self.values
            .remove(key)
            .map(|_| ())
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    async fn write_batch(&self, items: Vec<(([u8; 32], u64), Vec<u8>)>) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for ((hash, seq), value) in &items {
            batch.insert(hash.as_slice(), value.as_slice());
            let _ = seq;
        }
        self.values.apply_batch(batch).map_err(|e| StorageError::IoError(e.to_string()))?;
        for ((hash, seq), _) in items {
            self.by_sequence
                .insert(seq.to_be_bytes(), hash.as_slice())
                .map_err(|e| StorageError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("last_error mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, SledDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = SledDatabase::open(dir.path()).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn put_then_get_by_hash_and_sequence() {
        let (_dir, db) = open_temp().await;
        let key = [1u8; 32];
        db.put(&key, 5, b"payload").await.unwrap();

        let by_hash = db.get(RecordKey::Hash(&key)).await.unwrap().unwrap();
        assert_eq!(by_hash, b"payload");

        let by_seq = db.get(RecordKey::Sequence(5)).await.unwrap().unwrap();
        assert_eq!(by_seq, b"payload");
    }

    #[tokio::test]
    async fn missing_key_returns_none_not_error() {
        let (_dir, db) = open_temp().await;
        assert!(db.get(RecordKey::Sequence(99)).await.unwrap().is_none());
    }
}
