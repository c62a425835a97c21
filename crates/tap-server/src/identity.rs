//! Caller identity from trusted upstream headers.
//!
//! Token validation is done by the gateway in front of this server, which
//! forwards the resolved identity in `x-tap-*` headers. Requests without an
//! identity header are rejected before they reach the engine.

use std::collections::BTreeSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tap_core::Caller;

use crate::error::AppError;

pub const IDENTITY_HEADER: &str = "x-tap-identity";
pub const IDENTITIES_HEADER: &str = "x-tap-identities";
pub const GROUPS_HEADER: &str = "x-tap-groups";
pub const USERNAME_HEADER: &str = "x-tap-username";
pub const NAME_HEADER: &str = "x-tap-name";
pub const EMAIL_HEADER: &str = "x-tap-email";

/// Extractor yielding the resolved `Caller` for a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn header_list(headers: &HeaderMap, name: &str) -> BTreeSet<String> {
    header(headers, name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    let identity = header(headers, IDENTITY_HEADER)?;
    Some(Caller {
        identity: Some(identity),
        identities: header_list(headers, IDENTITIES_HEADER),
        groups: header_list(headers, GROUPS_HEADER),
        username: header(headers, USERNAME_HEADER),
        name: header(headers, NAME_HEADER),
        email: header(headers, EMAIL_HEADER),
    })
}

impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
            .map(AuthenticatedCaller)
            .ok_or_else(|| AppError::unauthenticated("missing caller identity"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_identity_and_lists() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("alice"));
        headers.insert(GROUPS_HEADER, HeaderValue::from_static("g1, g2,,"));
        headers.insert(EMAIL_HEADER, HeaderValue::from_static("alice@example.org"));

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.identity.as_deref(), Some("alice"));
        assert_eq!(caller.groups.len(), 2);
        assert!(caller.groups.contains("g2"));
        assert!(caller.identities.is_empty());
        assert_eq!(caller.email.as_deref(), Some("alice@example.org"));
    }

    #[test]
    fn blank_identity_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("   "));
        assert!(caller_from_headers(&headers).is_none());
        assert!(caller_from_headers(&HeaderMap::new()).is_none());
    }
}
