//! Multi-pose face enrollment.
//!
//! `Idle -> Preparing -> Capturing(pose_i) -> ... -> Completed | Cancelled | Failed`
//!
//! For each configured pose the controller accepts exactly one acceptable
//! detection whose head rotation passes the pose's alignment test. A pose
//! with no acceptable face for 3 s fails the session; nothing is committed
//! unless every pose was captured.

pub mod alignment;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;

pub use alignment::is_aligned;
pub use config::{EnrollmentConfig, EnrollmentMode, ReferencePolicy};
pub use controller::{EnrollmentController, EnrollmentObserver, NoopObserver};
pub use error::EnrollmentError;
pub use state::EnrollmentState;
