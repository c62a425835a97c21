//! Durable key-value storage behind the lifecycle engine.
//!
//! The engine only needs per-key atomicity, so the contract is a small set of
//! single-key operations. `put_if_absent` and `compare_and_swap` are what make
//! read-modify-write cycles on one key linearizable without cross-key
//! transactions. Every backend failure is reported as
//! `ActionError::StorageUnavailable`.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::Result;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Returns whether a value was present.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Insert only if `key` is vacant. On conflict nothing is written and the
    /// existing value is returned.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Replace the value of `key` with `new` (or delete it when `new` is
    /// `None`) only if the current value equals `expected`. Returns whether
    /// the swap happened.
    fn compare_and_swap(&self, key: &str, expected: &[u8], new: Option<&[u8]>) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}
