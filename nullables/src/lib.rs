//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency (clock, camera, face model, geolocation,
//! backend, renderer) sits behind a trait. The types here implement those
//! traits with values that:
//! - are deterministic,
//! - can be scripted programmatically,
//! - record calls for assertions.
//!
//! Nothing here touches a device or the network.

pub mod backend;
pub mod camera;
pub mod clock;
pub mod detector;
pub mod faces;
pub mod geo;
pub mod renderer;

pub use backend::NullScheduleBackend;
pub use camera::{NullCamera, NullStream};
pub use clock::NullClock;
pub use detector::ScriptedDetector;
pub use faces::{basis_embedding, face, posed_face, rotation_for, seeded_embedding};
pub use geo::NullGeolocator;
pub use renderer::NullRenderer;
