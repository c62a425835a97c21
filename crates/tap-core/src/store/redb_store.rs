//! File-backed store using redb.
//!
//! A single `kv` table maps string keys to raw bytes. Every trait operation is
//! one redb transaction; redb admits one write transaction at a time, which
//! gives each operation atomicity against every other.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use super::KvStore;
use crate::error::{ActionError, Result};

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

type KvTable<'txn> = redb::Table<'txn, &'static str, &'static [u8]>;

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating parent directories and
    /// the `kv` table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ActionError::unavailable)?;
        }
        let db = Database::create(path).map_err(ActionError::unavailable)?;
        // Ensure the table exists before any reads
        let wt = db.begin_write().map_err(ActionError::unavailable)?;
        wt.open_table(KV).map_err(ActionError::unavailable)?;
        wt.commit().map_err(ActionError::unavailable)?;
        Ok(Self { db })
    }

    /// Run `f` inside a write transaction and commit if it succeeds.
    fn write<T>(&self, f: impl FnOnce(&mut KvTable<'_>) -> Result<T>) -> Result<T> {
        let wt = self.db.begin_write().map_err(ActionError::unavailable)?;
        let out = {
            let mut table = wt.open_table(KV).map_err(ActionError::unavailable)?;
            f(&mut table)?
        };
        wt.commit().map_err(ActionError::unavailable)?;
        Ok(out)
    }
}

fn current(table: &KvTable<'_>, key: &str) -> Result<Option<Vec<u8>>> {
    Ok(table
        .get(key)
        .map_err(ActionError::unavailable)?
        .map(|v| v.value().to_vec()))
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let rt = self.db.begin_read().map_err(ActionError::unavailable)?;
        let table = rt.open_table(KV).map_err(ActionError::unavailable)?;
        Ok(table
            .get(key)
            .map_err(ActionError::unavailable)?
            .map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write(|table| {
            table.insert(key, value).map_err(ActionError::unavailable)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.write(|table| {
            let removed = table.remove(key).map_err(ActionError::unavailable)?;
            Ok(removed.is_some())
        })
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.write(|table| {
            if let Some(existing) = current(table, key)? {
                return Ok(Some(existing));
            }
            table.insert(key, value).map_err(ActionError::unavailable)?;
            Ok(None)
        })
    }

    fn compare_and_swap(&self, key: &str, expected: &[u8], new: Option<&[u8]>) -> Result<bool> {
        self.write(|table| {
            if current(table, key)?.as_deref() != Some(expected) {
                return Ok(false);
            }
            match new {
                Some(value) => {
                    table.insert(key, value).map_err(ActionError::unavailable)?;
                }
                None => {
                    table.remove(key).map_err(ActionError::unavailable)?;
                }
            }
            Ok(true)
        })
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let rt = self.db.begin_read().map_err(ActionError::unavailable)?;
        let table = rt.open_table(KV).map_err(ActionError::unavailable)?;

        let mut result = Vec::new();
        for entry in table.range(prefix..).map_err(ActionError::unavailable)? {
            let (k, v) = entry.map_err(ActionError::unavailable)?;
            if !k.value().starts_with(prefix) {
                break;
            }
            result.push((k.value().to_string(), v.value().to_vec()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("nested/test.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_reads_nothing() {
        let (_dir, store) = open_tmp();
        assert!(store.get("missing").unwrap().is_none());
        assert!(store.scan_prefix("").unwrap().is_empty());
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let (_dir, store) = open_tmp();
        store.put("action/a1", b"record").unwrap();
        assert_eq!(store.get("action/a1").unwrap().as_deref(), Some(&b"record"[..]));
        assert!(store.delete("action/a1").unwrap());
        assert!(store.get("action/a1").unwrap().is_none());
        assert!(!store.delete("action/a1").unwrap());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.put("request/r1", b"a1").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("request/r1").unwrap().as_deref(), Some(&b"a1"[..]));
    }

    #[test]
    fn put_if_absent_does_not_overwrite() {
        let (_dir, store) = open_tmp();
        assert!(store.put_if_absent("request/r1", b"a1").unwrap().is_none());
        let existing = store.put_if_absent("request/r1", b"a2").unwrap();
        assert_eq!(existing.as_deref(), Some(&b"a1"[..]));
        assert_eq!(store.get("request/r1").unwrap().as_deref(), Some(&b"a1"[..]));
    }

    #[test]
    fn compare_and_swap_guards_on_current_value() {
        let (_dir, store) = open_tmp();
        store.put("k", b"v1").unwrap();
        assert!(!store.compare_and_swap("k", b"stale", Some(b"v2")).unwrap());
        assert!(store.compare_and_swap("k", b"v1", Some(b"v2")).unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"v2"[..]));
        assert!(store.compare_and_swap("k", b"v2", None).unwrap());
        assert!(store.get("k").unwrap().is_none());
        assert!(!store.compare_and_swap("k", b"v2", None).unwrap());
    }

    #[test]
    fn scan_prefix_stops_at_prefix_boundary() {
        let (_dir, store) = open_tmp();
        store.put("action/1", b"a").unwrap();
        store.put("action/2", b"b").unwrap();
        store.put("request/1", b"c").unwrap();
        let found = store.scan_prefix("action/").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "action/1");
        assert_eq!(found[1].1, b"b".to_vec());
    }
}
