//! Error types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::pose::Pose;

/// Device, model and backend failures observed while verifying presence.
///
/// Transient conditions are retried inside the capture loops and only ever
/// surface as the "last observed reason" of an exhausted budget.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PresenceError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("face model failed to load: {0}")]
    ModelLoadFailure(String),

    #[error("no face detected")]
    NoFaceDetected,

    #[error("detection confidence too low")]
    LowConfidenceDetection,

    #[error("geolocation unavailable: {0}")]
    GeolocationUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl PresenceError {
    /// Fatal conditions abort a session immediately without retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::ModelLoadFailure(_) | Self::InvalidConfig(_)
        )
    }

    /// Per-frame conditions retried within the attempt/time budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoFaceDetected | Self::LowConfidenceDetection)
    }

    pub fn category(&self) -> ReasonCategory {
        match self {
            Self::CameraUnavailable(_) | Self::PermissionDenied(_) => ReasonCategory::CameraBlocked,
            Self::GeolocationUnavailable(_) => ReasonCategory::LocationUnavailable,
            Self::NoFaceDetected | Self::LowConfidenceDetection => ReasonCategory::NoMatch,
            Self::ModelLoadFailure(_) | Self::InvalidConfig(_) | Self::NetworkFailure(_) => {
                ReasonCategory::SetupError
            }
        }
    }
}

/// Human-distinguishable class of a terminal outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCategory {
    Verified,
    NoMatch,
    OutsideArea,
    CameraBlocked,
    LocationUnavailable,
    SetupError,
    Cancelled,
}

impl ReasonCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NoMatch => "no-match",
            Self::OutsideArea => "outside-area",
            Self::CameraBlocked => "camera-blocked",
            Self::LocationUnavailable => "location-unavailable",
            Self::SetupError => "setup-error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReasonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for profiles and their wire representations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ProfileError {
    #[error("embedding has {len} dimensions, need at least {min}")]
    EmbeddingTooShort { len: usize, min: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual} for pose {pose}")]
    DimensionMismatch {
        pose: Pose,
        expected: usize,
        actual: usize,
    },

    #[error("embedding contains a non-finite value")]
    NonFiniteEmbedding,

    #[error("profile has no straight pose")]
    MissingStraightPose,

    #[error("radius must be at least 1 meter, got {0}")]
    InvalidRadius(f64),

    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("unknown pose `{0}`")]
    UnknownPose(String),

    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
}
