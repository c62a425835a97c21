//! The work performed for each new request.
//!
//! The engine treats the work as opaque: it hands over the caller context and
//! the request body, and records whatever comes back. `IdentityIntrospection`
//! is the stand-in shipped with the service.

use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::Caller;

/// Failure of the work itself. Captured into a FAILED record, never returned
/// to the caller of `run`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WorkError {
    pub message: String,
    pub detail: Option<Value>,
}

impl WorkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Shape stored in the record's `details`.
    pub fn to_details(&self) -> Value {
        match &self.detail {
            Some(detail) => json!({ "error": self.message, "detail": detail }),
            None => json!({ "error": self.message }),
        }
    }
}

pub trait ActionRunner: Send + Sync {
    fn execute(&self, caller: &Caller, body: &Value) -> Result<Value, WorkError>;
}

impl<F> ActionRunner for F
where
    F: Fn(&Caller, &Value) -> Result<Value, WorkError> + Send + Sync,
{
    fn execute(&self, caller: &Caller, body: &Value) -> Result<Value, WorkError> {
        self(caller, body)
    }
}

// ---------------------------------------------------------------------------
// IdentityIntrospection
// ---------------------------------------------------------------------------

/// Reports the caller's identity and group memberships back as the result.
pub struct IdentityIntrospection {
    issuer: String,
}

impl IdentityIntrospection {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into().trim_end_matches('/').to_string(),
        }
    }

    fn qualify(&self, id: &str) -> String {
        format!("{}/{}", self.issuer, id)
    }
}

impl ActionRunner for IdentityIntrospection {
    fn execute(&self, caller: &Caller, _body: &Value) -> Result<Value, WorkError> {
        let identity = caller
            .identity
            .as_deref()
            .ok_or_else(|| WorkError::new("caller has no effective identity"))?;

        let client = json!({
            "id": self.qualify(identity),
            "display_name": caller.username,
            "full_name": caller.name,
            "email": caller.email,
            "identities": caller.identities,
        });

        let mut attributes: Vec<Value> = caller
            .groups
            .iter()
            .map(|g| json!({ "id": self.qualify(g), "display_name": g }))
            .collect();
        attributes.push(client.clone());

        Ok(json!({
            "userinfo": {
                "client": client,
                "attributes": attributes,
            }
        }))
    }
}
