use rollcall_backend::BackendError;
use rollcall_types::PresenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("no scopes to broadcast")]
    NoScopes,

    #[error("broadcaster already loaded")]
    AlreadyLoaded,

    #[error("broadcaster already stopped")]
    Stopped,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("push transport error: {0}")]
    Transport(String),
}

impl From<BroadcastError> for PresenceError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::Backend(e) => e.into(),
            BroadcastError::Transport(_) => PresenceError::NetworkFailure(err.to_string()),
            BroadcastError::NoScopes | BroadcastError::AlreadyLoaded | BroadcastError::Stopped => {
                PresenceError::InvalidConfig(err.to_string())
            }
        }
    }
}
