use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Unknown action, or an action the caller may not see. Both read the same.
    #[error("action not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("invalid duration '{0}': expected ISO-8601 like P30D or PT1H30M")]
    InvalidDuration(String),

    #[error("not initialized: run 'tap init'")]
    NotInitialized,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ActionError {
    pub(crate) fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
