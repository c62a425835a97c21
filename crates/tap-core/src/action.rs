//! Action record model.
//!
//! An `ActionRecord` is one tracked unit of work: who started it, who may see
//! or manage it, where it is in its lifecycle and, once terminal, what it
//! produced. The engine is the only writer; the store owns the serialized form.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::{deserialize_iso, deserialize_iso_opt, serialize_iso, serialize_iso_opt};

/// Creator recorded when the caller has no effective identity.
pub const UNKNOWN_CREATOR: &str = "UNKNOWN";

/// Display text written by `cancel`.
pub const CANCELED_DISPLAY: &str = "Canceled by user request";

/// Display text written by startup recovery.
pub const RECOVERED_DISPLAY: &str = "Recovered after restart";

// ---------------------------------------------------------------------------
// ActionStatusValue
// ---------------------------------------------------------------------------

/// Lifecycle state of an action.
///
/// Transitions: `Active → Succeeded | Failed`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatusValue {
    Active,
    Succeeded,
    Failed,
}

impl ActionStatusValue {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ActionStatusValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionRequest
// ---------------------------------------------------------------------------

/// Inbound request to run an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Idempotency key chosen by the caller; retries reuse it.
    pub request_id: String,
    /// Opaque input handed to the work function.
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub monitor_by: BTreeSet<String>,
    #[serde(default)]
    pub manage_by: BTreeSet<String>,
    #[serde(
        serialize_with = "serialize_iso_opt",
        deserialize_with = "deserialize_iso_opt",
        default
    )]
    pub release_after: Option<Duration>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ActionRequest {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub request_id: String,
    pub status: ActionStatusValue,
    pub display_status: String,
    pub creator_id: String,
    #[serde(default)]
    pub monitor_by: BTreeSet<String>,
    #[serde(default)]
    pub manage_by: BTreeSet<String>,
    pub start_time: DateTime<Utc>,
    /// Set if and only if `status` is terminal.
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_iso", deserialize_with = "deserialize_iso")]
    pub release_after: Duration,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ActionRecord {
    /// A fresh `Active` record for `request`, created by `creator`.
    pub fn new_active(request: &ActionRequest, creator: Option<&str>, release_after: Duration) -> Self {
        Self {
            action_id: Uuid::new_v4().simple().to_string(),
            request_id: request.request_id.clone(),
            status: ActionStatusValue::Active,
            display_status: ActionStatusValue::Active.to_string(),
            creator_id: creator.unwrap_or(UNKNOWN_CREATOR).to_string(),
            monitor_by: request.monitor_by.clone(),
            manage_by: request.manage_by.clone(),
            start_time: Utc::now(),
            completion_time: None,
            release_after: request.release_after.unwrap_or(release_after),
            label: request.label.clone(),
            details: serde_json::Value::Null,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a terminal state. Returns `false` and leaves the record
    /// untouched if it is already terminal or `status` is not terminal.
    pub fn complete(
        &mut self,
        status: ActionStatusValue,
        display_status: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.display_status = display_status.into();
        self.completion_time = Some(Utc::now());
        if let Some(details) = details {
            self.details = details;
        }
        true
    }

    /// Earliest time the record may be reclaimed. `None` while active.
    pub fn releasable_at(&self) -> Option<DateTime<Utc>> {
        let done = self.completion_time?;
        let after = chrono::Duration::from_std(self.release_after).ok()?;
        done.checked_add_signed(after)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.releasable_at().is_some_and(|at| at <= now)
    }
}
