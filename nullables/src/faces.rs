//! Synthetic faces and embeddings.

use rollcall_types::{Demographics, Embedding, HeadRotation, Pose, MIN_EMBEDDING_DIM};
use rollcall_vision::{BoundingBox, DetectedFace};

/// Unit vector along axis `axis` (mod the dimension). Distinct axes are
/// orthogonal, so their cosine similarity is 0.
pub fn basis_embedding(axis: usize) -> Embedding {
    let mut values = vec![0.0; MIN_EMBEDDING_DIM];
    values[axis % MIN_EMBEDDING_DIM] = 1.0;
    Embedding::new(values)
}

/// Deterministic pseudo-random embedding in `[-1, 1)`.
pub fn seeded_embedding(seed: u64) -> Embedding {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    let values = (0..MIN_EMBEDDING_DIM)
        .map(|_| {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect();
    Embedding::new(values)
}

/// Head rotation well inside the alignment window of `pose`.
pub fn rotation_for(pose: Pose) -> HeadRotation {
    match pose {
        Pose::Straight => HeadRotation::new(0.0, 0.0),
        Pose::Left => HeadRotation::new(-0.5, 0.0),
        Pose::Right => HeadRotation::new(0.5, 0.0),
        Pose::Up => HeadRotation::new(0.0, -0.4),
        Pose::Down => HeadRotation::new(0.0, 0.4),
    }
}

/// A confident, frontal face.
pub fn face(embedding: Embedding) -> DetectedFace {
    DetectedFace {
        bbox: BoundingBox {
            x: 200.0,
            y: 120.0,
            width: 240.0,
            height: 240.0,
        },
        embedding,
        rotation: HeadRotation::default(),
        demographics: Demographics {
            age: 31.0,
            gender: "female".to_string(),
            dominant_emotion: "neutral".to_string(),
        },
        confidence: 0.95,
    }
}

/// A confident face turned toward `pose`.
pub fn posed_face(pose: Pose, embedding: Embedding) -> DetectedFace {
    DetectedFace {
        rotation: rotation_for(pose),
        ..face(embedding)
    }
}
