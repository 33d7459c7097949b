//! Enrollment session state.

use rollcall_types::Pose;

use crate::error::EnrollmentError;

#[derive(Clone, Debug, PartialEq)]
pub enum EnrollmentState {
    Idle,
    /// Loading the model and opening the camera.
    Preparing,
    /// Waiting for an aligned capture of `pose` (`index` of `total`).
    Capturing { pose: Pose, index: usize, total: usize },
    Completed,
    Cancelled,
    Failed(EnrollmentError),
}

impl EnrollmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &EnrollmentState) -> bool {
        use EnrollmentState::*;
        match (self, next) {
            (Idle, Preparing) => true,
            (Preparing, Capturing { .. }) => true,
            (Capturing { index: a, .. }, Capturing { index: b, .. }) => b > a,
            (Preparing | Capturing { .. }, Completed) => true,
            (Preparing | Capturing { .. }, Cancelled | Failed(_)) => true,
            (Idle, Failed(_)) => true,
            _ => false,
        }
    }
}
