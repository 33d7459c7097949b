//! Presence verification.
//!
//! A verification runs at most two steps:
//! 1. **Location**: one geolocation sample tested against the target
//!    geofence. A strict geofence that is not satisfied ends the session
//!    before the camera is opened.
//! 2. **Face**: up to `max_attempts` live samples compared against the
//!    enrolled reference by cosine similarity, stopping as soon as
//!    `required_successes` of them match.
//!
//! Either step may be absent. Strictness decides whether a failed step
//! blocks the overall decision.

pub mod attempt;
pub mod config;
pub mod consensus;
pub mod decision;
pub mod engine;
pub mod error;
pub mod similarity;

pub use attempt::{AttemptRecord, FaceSample, VerificationAttempt};
pub use config::{EngineOptions, FaceConfig, GeoConfig, VerificationConfig};
pub use consensus::{ConsensusState, ConsensusTally};
pub use decision::{overall_match, FaceOutcome, GeoOutcome};
pub use engine::{NoopVerificationObserver, VerificationEngine, VerificationObserver};
pub use error::{Rejection, VerificationError};
pub use similarity::{cosine_similarity, is_match};
