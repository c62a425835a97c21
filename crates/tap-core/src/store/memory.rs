use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::KvStore;
use crate::error::{ActionError, Result};

/// In-process store. Nothing survives the process; used by tests and by
/// `tap serve --memory`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.inner.read().map_err(ActionError::unavailable)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.inner.write().map_err(ActionError::unavailable)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut map = self.write()?;
        if let Some(existing) = map.get(key) {
            return Ok(Some(existing.clone()));
        }
        map.insert(key.to_string(), value.to_vec());
        Ok(None)
    }

    fn compare_and_swap(&self, key: &str, expected: &[u8], new: Option<&[u8]>) -> Result<bool> {
        let mut map = self.write()?;
        if map.get(key).map(Vec::as_slice) != Some(expected) {
            return Ok(false);
        }
        match new {
            Some(value) => {
                map.insert(key.to_string(), value.to_vec());
            }
            None => {
                map.remove(key);
            }
        }
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let map = self.read()?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
