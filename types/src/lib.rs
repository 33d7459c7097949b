//! Fundamental types for rollcall.
//!
//! This crate defines the data model shared across every other crate in the
//! workspace: embeddings, poses, coordinates, face and geofence profiles,
//! presence tokens, timestamps and the shared error taxonomy.

pub mod embedding;
pub mod error;
pub mod geo;
pub mod image;
pub mod pose;
pub mod profile;
pub mod time;
pub mod token;

pub use embedding::{Embedding, MIN_EMBEDDING_DIM};
pub use error::{PresenceError, ProfileError, ReasonCategory};
pub use geo::GeoPoint;
pub use image::EncodedImage;
pub use pose::{HeadRotation, Pose};
pub use profile::{validate_radius, Demographics, FaceProfile, FaceProfileRecord, GeofenceProfile};
pub use time::{Clock, SystemClock, Timestamp};
pub use token::{PresenceToken, ScopeId};
