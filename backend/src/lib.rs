//! Backend collaborator: the persistence and scheduling service that owns
//! profiles and tokens.
//!
//! Three operations are consumed and treated as opaque:
//! - `startSchedule(scopeIds[])`: begin rotating tokens for the scopes,
//! - `stopSchedule(scopeIds[])`: stop rotation, delivered reliably,
//! - `resolveToken(token)`: look up the verification config behind a token.
//!
//! [`HttpBackend`] speaks them over HTTP/JSON:
//! - `POST {base}/schedule/start` `{"scopes": [...]}`
//! - `POST {base}/schedule/stop` `{"scopes": [...]}`
//! - `GET {base}/tokens/{token}` -> [`TokenResolution`]

pub mod client;
pub mod error;
pub mod schedule;
pub mod types;

pub use client::{HttpBackend, RetryPolicy};
pub use error::BackendError;
pub use schedule::{ScheduleBackend, TokenResolver};
pub use types::{ScopePolicy, TokenResolution};
