//! Versioned encoding of `ActionRecord` for the store.
//!
//! Records are written as `{"schema_version": N, "record": {...}}`. Decoding
//! refuses any version it does not know instead of guessing at the layout.

use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;
use crate::error::{ActionError, Result};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    record: &'a ActionRecord,
}

#[derive(Deserialize)]
struct Header {
    schema_version: u32,
}

#[derive(Deserialize)]
struct Envelope {
    record: ActionRecord,
}

pub fn encode(record: &ActionRecord) -> Result<Vec<u8>> {
    let env = EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        record,
    };
    Ok(serde_json::to_vec(&env)?)
}

pub fn decode(bytes: &[u8]) -> Result<ActionRecord> {
    let header: Header = serde_json::from_slice(bytes)
        .map_err(|e| ActionError::Corrupt(format!("unreadable envelope: {e}")))?;
    if header.schema_version != SCHEMA_VERSION {
        return Err(ActionError::Corrupt(format!(
            "schema version {} is not supported (expected {SCHEMA_VERSION})",
            header.schema_version
        )));
    }
    let env: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| ActionError::Corrupt(format!("unreadable record: {e}")))?;
    Ok(env.record)
}
