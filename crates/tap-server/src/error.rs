use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tap_core::error::ActionError;

// ---------------------------------------------------------------------------
// Internal sentinel for requests without a resolved identity
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 401 through
/// the `anyhow::Error` chain without touching the `ActionError` enum.
#[derive(Debug)]
struct UnauthenticatedError(String);

impl std::fmt::Display for UnauthenticatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthenticatedError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 401 Unauthorized error.
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self(UnauthenticatedError(msg.into()).into())
    }

    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }
}

fn status_for(err: &ActionError) -> StatusCode {
    match err {
        ActionError::NotFound(_) => StatusCode::NOT_FOUND,
        ActionError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        ActionError::InvalidState(_) => StatusCode::CONFLICT,
        ActionError::InvalidRequest(_) | ActionError::InvalidDuration(_) => {
            StatusCode::BAD_REQUEST
        }
        ActionError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ActionError::Corrupt(_)
        | ActionError::NotInitialized
        | ActionError::Io(_)
        | ActionError::Yaml(_)
        | ActionError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(u) = self.0.downcast_ref::<UnauthenticatedError>() {
            let body = serde_json::json!({ "error": u.0.clone() });
            return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
        }

        let status = match self.0.downcast_ref::<ActionError>() {
            Some(e) => status_for(e),
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: ActionError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status(ActionError::NotFound("a1".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn not_authorized_maps_to_403() {
        assert_eq!(
            status(ActionError::NotAuthorized("a1".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn invalid_state_maps_to_409() {
        assert_eq!(
            status(ActionError::InvalidState("not complete".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_request_maps_to_400() {
        assert_eq!(
            status(ActionError::InvalidRequest("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ActionError::InvalidDuration("P1Y".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_unavailable_maps_to_503() {
        assert_eq!(
            status(ActionError::StorageUnavailable("disk".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn corrupt_maps_to_500() {
        assert_eq!(
            status(ActionError::Corrupt("v9".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthenticated_constructor_maps_to_401() {
        let err = AppError::unauthenticated("missing identity");
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(ActionError::NotFound("a1".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
