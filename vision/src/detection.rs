//! Face detection results and the acceptability filter.

use async_trait::async_trait;
use rollcall_types::{Demographics, Embedding, HeadRotation, PresenceError, MIN_EMBEDDING_DIM};
use serde::{Deserialize, Serialize};

use crate::camera::Frame;

/// Minimum detector confidence for a detection to be trusted.
pub const MIN_CONFIDENCE: f32 = 0.8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A face found in a frame by the embedding/landmark model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
    pub rotation: HeadRotation,
    pub demographics: Demographics,
    pub confidence: f32,
}

impl DetectedFace {
    /// Whether this detection may be trusted by any caller.
    pub fn is_acceptable(&self) -> bool {
        self.confidence >= MIN_CONFIDENCE && self.embedding.len() >= MIN_EMBEDDING_DIM
    }
}

/// The face embedding/landmark model.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Load model weights. Fails with `ModelLoadFailure`.
    async fn load(&self) -> Result<(), PresenceError>;

    async fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, PresenceError>;
}

/// Pick the most confident acceptable face.
///
/// An empty result is `NoFaceDetected`; faces that all fail the filter are
/// `LowConfidenceDetection`. Both are transient.
pub fn select_face(faces: Vec<DetectedFace>) -> Result<DetectedFace, PresenceError> {
    if faces.is_empty() {
        return Err(PresenceError::NoFaceDetected);
    }
    faces
        .into_iter()
        .filter(DetectedFace::is_acceptable)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .ok_or(PresenceError::LowConfidenceDetection)
}
