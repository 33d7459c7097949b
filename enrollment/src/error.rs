use rollcall_types::{Pose, PresenceError, ProfileError, ReasonCategory};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EnrollmentError {
    #[error("enrollment cancelled")]
    Cancelled,

    #[error("no acceptable face for pose {pose} within {timeout_ms}ms")]
    PoseTimeout { pose: Pose, timeout_ms: u64 },

    #[error("enrollment exceeded its {0}ms session budget")]
    SessionTimeout(u64),

    #[error("invalid enrollment config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error("invalid profile: {0}")]
    Profile(#[from] ProfileError),
}

impl EnrollmentError {
    pub fn category(&self) -> ReasonCategory {
        match self {
            Self::Cancelled => ReasonCategory::Cancelled,
            Self::PoseTimeout { .. } | Self::SessionTimeout(_) => ReasonCategory::NoMatch,
            Self::InvalidConfig(_) | Self::Profile(_) => ReasonCategory::SetupError,
            Self::Presence(e) => e.category(),
        }
    }
}
