//! Backend wire types.

use rollcall_types::{FaceProfileRecord, GeofenceProfile, ScopeId};
use serde::{Deserialize, Serialize};

/// Per-scope verification policy configured on the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopePolicy {
    pub face_strict: bool,
    pub geo_strict: bool,
    pub similarity_threshold: f64,
    pub max_attempts: u32,
    pub required_successes: u32,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self {
            face_strict: true,
            geo_strict: true,
            similarity_threshold: 0.7,
            max_attempts: 5,
            required_successes: 3,
        }
    }
}

/// What a token resolves to: the owner's stored profiles plus the policy of
/// the scope that issued it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenResolution {
    pub scope_id: ScopeId,
    pub owner: String,
    #[serde(default)]
    pub face: Option<FaceProfileRecord>,
    #[serde(default)]
    pub geofence: Option<GeofenceProfile>,
    /// Whether the stored face profile also requires an emotion match.
    #[serde(default)]
    pub require_emotion_match: bool,
    #[serde(default)]
    pub policy: ScopePolicy,
}
