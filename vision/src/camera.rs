//! Camera acquisition seam.

use async_trait::async_trait;
use rollcall_types::{EncodedImage, PresenceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which camera to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    #[default]
    User,
    /// Rear camera.
    Environment,
}

/// Media constraints requested when acquiring a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

/// One captured video frame, already encoded as a still image.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Monotonic per-stream counter.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub image: EncodedImage,
}

/// A camera device.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Open a stream. Fails with `CameraUnavailable` or `PermissionDenied`.
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Arc<dyn VideoStream>, PresenceError>;
}

/// An open camera stream.
#[async_trait]
pub trait VideoStream: Send + Sync {
    async fn next_frame(&self) -> Result<Frame, PresenceError>;

    /// Stop all tracks. Safe to call any number of times.
    fn release(&self);

    fn is_released(&self) -> bool;
}
