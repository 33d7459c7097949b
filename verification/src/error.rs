use rollcall_backend::BackendError;
use rollcall_types::{PresenceError, ProfileError, ReasonCategory};
use thiserror::Error;

use crate::attempt::VerificationAttempt;

/// Why a completed session was not accepted.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Rejection {
    #[error("outside the allowed area: {distance_meters:.1} m from target, radius {radius_meters:.1} m")]
    GeoRejected {
        distance_meters: f64,
        radius_meters: f64,
    },

    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("face did not match: {successes} of {required} required matches in {attempts} attempts")]
    NoMatch {
        successes: u32,
        required: u32,
        attempts: u32,
        /// Last per-frame condition observed before the budget ran out.
        last_reason: Option<PresenceError>,
    },
}

impl Rejection {
    pub fn category(&self) -> ReasonCategory {
        match self {
            Rejection::GeoRejected { .. } => ReasonCategory::OutsideArea,
            Rejection::LocationUnavailable(_) => ReasonCategory::LocationUnavailable,
            Rejection::NoMatch { .. } => ReasonCategory::NoMatch,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum VerificationError {
    /// The session ran to completion and the decision was negative.
    #[error("verification rejected: {rejection}")]
    Rejected {
        rejection: Rejection,
        attempt: Box<VerificationAttempt>,
    },

    #[error("verification cancelled")]
    Cancelled,

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error("invalid profile: {0}")]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl VerificationError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        VerificationError::Presence(PresenceError::InvalidConfig(message.into()))
    }

    pub fn category(&self) -> ReasonCategory {
        match self {
            VerificationError::Rejected { rejection, .. } => rejection.category(),
            VerificationError::Cancelled => ReasonCategory::Cancelled,
            VerificationError::Presence(e) => e.category(),
            VerificationError::Profile(_) => ReasonCategory::SetupError,
            VerificationError::Backend(e) => PresenceError::from(e.clone()).category(),
        }
    }

    /// The rejected attempt, for negative outcomes that produced one.
    pub fn attempt(&self) -> Option<&VerificationAttempt> {
        match self {
            VerificationError::Rejected { attempt, .. } => Some(attempt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_distinguishable() {
        let geo = Rejection::GeoRejected {
            distance_meters: 150.0,
            radius_meters: 100.0,
        };
        let face = Rejection::NoMatch {
            successes: 1,
            required: 3,
            attempts: 5,
            last_reason: Some(PresenceError::NoFaceDetected),
        };
        assert_eq!(geo.category(), ReasonCategory::OutsideArea);
        assert_eq!(face.category(), ReasonCategory::NoMatch);
        assert_eq!(
            VerificationError::from(PresenceError::PermissionDenied("denied".into())).category(),
            ReasonCategory::CameraBlocked
        );
        assert_eq!(
            VerificationError::invalid_config("x").category(),
            ReasonCategory::SetupError
        );
        assert_eq!(VerificationError::Cancelled.category(), ReasonCategory::Cancelled);
    }

    #[test]
    fn geo_rejection_message_names_distance() {
        let rejection = Rejection::GeoRejected {
            distance_meters: 150.04,
            radius_meters: 100.0,
        };
        assert_eq!(
            rejection.to_string(),
            "outside the allowed area: 150.0 m from target, radius 100.0 m"
        );
    }
}
