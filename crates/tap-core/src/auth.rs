//! Caller context and per-record authorization.
//!
//! Identity resolution happens upstream; this module only answers whether an
//! already-resolved caller may monitor or manage a given record. The answer is
//! an explicit `Authorization` value so the engine decides how a denial is
//! reported.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;

/// Authorization context for one call, as resolved by the upstream provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Effective identity. `None` for anonymous callers.
    pub identity: Option<String>,
    /// Linked identities of the same person.
    #[serde(default)]
    pub identities: BTreeSet<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Caller {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identities.insert(identity.into());
        self
    }

    /// Every id this caller can be matched by: effective identity, linked
    /// identities and groups.
    pub fn principals(&self) -> BTreeSet<&str> {
        self.identity
            .iter()
            .chain(self.identities.iter())
            .chain(self.groups.iter())
            .map(String::as_str)
            .collect()
    }

    fn is_creator_of(&self, record: &ActionRecord) -> bool {
        self.identity.as_deref() == Some(record.creator_id.as_str())
    }

    fn in_any(&self, set: &BTreeSet<String>) -> bool {
        self.principals().iter().any(|p| set.contains(*p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Denied,
}

impl Authorization {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Self::Authorized
        } else {
            Self::Denied
        }
    }
}

/// Read access: the creator, or anyone in `monitor_by` or `manage_by`.
pub fn can_monitor(record: &ActionRecord, caller: &Caller) -> Authorization {
    Authorization::from_bool(
        caller.is_creator_of(record)
            || caller.in_any(&record.monitor_by)
            || caller.in_any(&record.manage_by),
    )
}

/// Write access: the creator, or anyone in `manage_by`.
pub fn can_manage(record: &ActionRecord, caller: &Caller) -> Authorization {
    Authorization::from_bool(caller.is_creator_of(record) || caller.in_any(&record.manage_by))
}
