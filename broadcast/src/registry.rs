//! Per-scope subscription state owned by the broadcaster.

use std::collections::BTreeMap;
use std::time::Duration;

use rollcall_types::{PresenceToken, ScopeId};
use tokio::time::Instant;

/// One joined push channel.
#[derive(Clone, Debug, PartialEq)]
pub struct BroadcastSubscription {
    pub scope_id: ScopeId,
    pub channel_name: String,
    pub subscribed_at: Instant,
    /// When the last rotation arrived, if any.
    pub last_update_at: Option<Instant>,
    pub current: Option<PresenceToken>,
}

impl BroadcastSubscription {
    /// Start of the current quiet period.
    pub fn quiet_since(&self) -> Instant {
        self.last_update_at.unwrap_or(self.subscribed_at)
    }

    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.quiet_since()) >= threshold
    }
}

/// What a rotation event did to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenUpdate {
    /// First token for the scope since subscribing.
    First,
    /// Replaced a previous token.
    Rotated,
    /// Same value as the current token; only the activity time moved.
    Unchanged,
    /// No subscription for the scope.
    UnknownScope,
}

/// Subscriptions keyed by scope. Created on load, cleared on stop.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: BTreeMap<ScopeId, BroadcastSubscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns `false` if the scope is already tracked.
    pub fn subscribe(&mut self, scope_id: ScopeId, channel_name: String, now: Instant) -> bool {
        if self.subscriptions.contains_key(&scope_id) {
            return false;
        }
        self.subscriptions.insert(
            scope_id.clone(),
            BroadcastSubscription {
                scope_id,
                channel_name,
                subscribed_at: now,
                last_update_at: None,
                current: None,
            },
        );
        true
    }

    pub fn remove(&mut self, scope_id: &ScopeId) -> Option<BroadcastSubscription> {
        self.subscriptions.remove(scope_id)
    }

    pub fn contains(&self, scope_id: &ScopeId) -> bool {
        self.subscriptions.contains_key(scope_id)
    }

    pub fn get(&self, scope_id: &ScopeId) -> Option<&BroadcastSubscription> {
        self.subscriptions.get(scope_id)
    }

    pub fn record_update(&mut self, token: PresenceToken, now: Instant) -> TokenUpdate {
        let Some(sub) = self.subscriptions.get_mut(&token.scope_id) else {
            return TokenUpdate::UnknownScope;
        };
        sub.last_update_at = Some(now);
        let update = match &sub.current {
            None => TokenUpdate::First,
            Some(current) if current.is_superseded_by(&token) => TokenUpdate::Rotated,
            Some(_) => return TokenUpdate::Unchanged,
        };
        sub.current = Some(token);
        update
    }

    /// True when there is at least one subscription and all of them have
    /// been quiet for `threshold`.
    pub fn all_idle(&self, now: Instant, threshold: Duration) -> bool {
        !self.subscriptions.is_empty()
            && self
                .subscriptions
                .values()
                .all(|sub| sub.is_idle(now, threshold))
    }

    pub fn scope_ids(&self) -> Vec<ScopeId> {
        self.subscriptions.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<BroadcastSubscription> {
        self.subscriptions.values().cloned().collect()
    }

    /// Remove and return every subscription.
    pub fn clear(&mut self) -> Vec<BroadcastSubscription> {
        std::mem::take(&mut self.subscriptions).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
