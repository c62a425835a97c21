//! Request-id → action-id mapping kept in the same store as the records.

use crate::error::{ActionError, Result};
use crate::store::KvStore;

const REQUEST_PREFIX: &str = "request/";
const ACTION_PREFIX: &str = "action/";

pub fn request_key(request_id: &str) -> String {
    format!("{REQUEST_PREFIX}{request_id}")
}

pub fn action_key(action_id: &str) -> String {
    format!("{ACTION_PREFIX}{action_id}")
}

pub(crate) fn action_prefix() -> &'static str {
    ACTION_PREFIX
}

/// Outcome of trying to bind a request id to a new action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    /// Another call already bound this request id.
    Existing(String),
}

pub struct IdempotencyIndex<'a> {
    store: &'a dyn KvStore,
}

impl<'a> IdempotencyIndex<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    pub fn resolve(&self, request_id: &str) -> Result<Option<String>> {
        self.store
            .get(&request_key(request_id))?
            .map(decode_id)
            .transpose()
    }

    /// Bind `request_id` to `action_id` unless it is already bound.
    pub fn claim(&self, request_id: &str, action_id: &str) -> Result<Claim> {
        match self
            .store
            .put_if_absent(&request_key(request_id), action_id.as_bytes())?
        {
            None => Ok(Claim::Claimed),
            Some(existing) => Ok(Claim::Existing(decode_id(existing)?)),
        }
    }
}

fn decode_id(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| ActionError::Corrupt(format!("idempotency entry is not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn unknown_request_resolves_to_none() {
        let store = MemoryStore::new();
        let index = IdempotencyIndex::new(&store);
        assert!(index.resolve("r1").unwrap().is_none());
    }

    #[test]
    fn first_claim_wins() {
        let store = MemoryStore::new();
        let index = IdempotencyIndex::new(&store);
        assert_eq!(index.claim("r1", "a1").unwrap(), Claim::Claimed);
        assert_eq!(index.claim("r1", "a2").unwrap(), Claim::Existing("a1".into()));
        assert_eq!(index.resolve("r1").unwrap().as_deref(), Some("a1"));
    }

    #[test]
    fn keys_are_namespaced() {
        let store = MemoryStore::new();
        let index = IdempotencyIndex::new(&store);
        index.claim("x", "a1").unwrap();
        assert!(store.get("request/x").unwrap().is_some());
        assert!(store.get("action/x").unwrap().is_none());
    }

    #[test]
    fn non_utf8_entry_is_corrupt() {
        let store = MemoryStore::new();
        store.put(&request_key("bad"), &[0xff, 0xfe]).unwrap();
        let index = IdempotencyIndex::new(&store);
        assert!(matches!(index.resolve("bad"), Err(ActionError::Corrupt(_))));
    }
}
