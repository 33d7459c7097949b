//! Camera and face-detector adapter.
//!
//! The camera and the embedding/landmark model are external devices. This
//! crate defines the seams they plug into and the rules every caller follows:
//! - only *acceptable* detections (confidence >= 0.8, embedding >= 128 dims)
//!   are trusted,
//! - at most one camera stream is held at a time ([`CameraArbiter`]),
//! - a running capture loop can be stopped synchronously ([`SessionControl`]).

pub mod camera;
pub mod control;
pub mod detection;
pub mod session;

pub use camera::{Camera, CameraConstraints, FacingMode, Frame, VideoStream};
pub use control::SessionControl;
pub use detection::{select_face, BoundingBox, DetectedFace, FaceDetector, MIN_CONFIDENCE};
pub use session::{CameraArbiter, CameraSession};
