//! Presence token broadcaster.
//!
//! On load the broadcaster asks the backend to start rotating tokens for
//! every tracked scope in one batched request, joins one push channel per
//! scope, and renders each rotation. The first token for a scope plays a
//! reveal animation. A monitor stops the schedule once every scope has been
//! silent for the inactivity threshold; navigation-away events take the same
//! one-shot stop path.

pub mod broadcaster;
pub mod channel;
pub mod error;
pub mod registry;
pub mod renderer;

pub use broadcaster::{
    channel_name, BroadcastEvent, BroadcasterConfig, PageEvent, PresenceBroadcaster, StopReason,
};
pub use channel::{LocalChannelHub, PushEvent, PushTransport, WsPushTransport};
pub use error::BroadcastError;
pub use registry::{BroadcastSubscription, SubscriptionRegistry, TokenUpdate};
pub use renderer::{LogRenderer, RevealAnimation, TokenRenderer};
