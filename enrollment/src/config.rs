//! Enrollment session configuration.

use std::collections::HashSet;
use std::time::Duration;

use rollcall_types::{FaceProfile, Pose};
use rollcall_vision::CameraConstraints;
use serde::{Deserialize, Serialize};

use crate::error::EnrollmentError;

/// How the profile's reference embedding is derived from the captured poses.
///
/// Verification compares live samples against the reference, which defaults
/// to the straight-pose capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    #[default]
    StraightOnly,
    /// Element-wise mean across every captured pose.
    MeanOfPoses,
}

#[derive(Clone, Debug)]
pub struct EnrollmentConfig {
    /// Poses to capture, in order. Must include `straight`.
    pub poses: Vec<Pose>,
    /// Delay between frame evaluations.
    pub frame_interval: Duration,
    /// Pause after an accepted capture before the next pose is evaluated.
    pub capture_debounce: Duration,
    /// Fail the pose after this long without an acceptable face.
    pub idle_timeout: Duration,
    /// Wall-clock budget for the whole session.
    pub session_budget: Duration,
    pub constraints: CameraConstraints,
    pub reference_policy: ReferencePolicy,
    pub require_emotion_match: bool,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            poses: Pose::ALL.to_vec(),
            frame_interval: Duration::from_millis(200),
            capture_debounce: Duration::from_millis(200),
            idle_timeout: Duration::from_millis(3000),
            session_budget: Duration::from_secs(60),
            constraints: CameraConstraints::default(),
            reference_policy: ReferencePolicy::default(),
            require_emotion_match: false,
        }
    }
}

impl EnrollmentConfig {
    pub fn with_poses(poses: impl Into<Vec<Pose>>) -> Self {
        Self {
            poses: poses.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EnrollmentError> {
        if self.poses.is_empty() {
            return Err(EnrollmentError::InvalidConfig("no poses configured".into()));
        }
        if !self.poses.contains(&Pose::Straight) {
            return Err(EnrollmentError::InvalidConfig(
                "pose list must include straight".into(),
            ));
        }
        let unique: HashSet<_> = self.poses.iter().collect();
        if unique.len() != self.poses.len() {
            return Err(EnrollmentError::InvalidConfig(
                "pose list contains duplicates".into(),
            ));
        }
        if self.idle_timeout.is_zero() || self.session_budget.is_zero() {
            return Err(EnrollmentError::InvalidConfig(
                "timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Fresh enrollment, or re-enrollment seeded from a stored profile.
#[derive(Clone, Debug, Default)]
pub enum EnrollmentMode {
    #[default]
    Fresh,
    /// Copy poses `0..keep` from `previous` and capture only the rest.
    Update { previous: FaceProfile, keep: usize },
}

impl EnrollmentMode {
    pub fn keep(&self) -> usize {
        match self {
            Self::Fresh => 0,
            Self::Update { keep, .. } => *keep,
        }
    }
}
