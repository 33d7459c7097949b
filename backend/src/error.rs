use rollcall_types::PresenceError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("HTTP request to backend failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("token {0} is unknown or expired")]
    TokenNotFound(String),
}

impl From<BackendError> for PresenceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::TokenNotFound(_) | BackendError::InvalidResponse(_) => {
                PresenceError::InvalidConfig(err.to_string())
            }
            BackendError::RequestFailed(_) | BackendError::Unreachable(_) => {
                PresenceError::NetworkFailure(err.to_string())
            }
        }
    }
}
