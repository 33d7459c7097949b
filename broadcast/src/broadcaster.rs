//! Broadcaster lifecycle: load, rotate, reveal, stop.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rollcall_backend::ScheduleBackend;
use rollcall_types::{Clock, PresenceToken, ScopeId, SystemClock};
use rollcall_utils::StatsCounter;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::channel::{PushEvent, PushTransport};
use crate::error::BroadcastError;
use crate::registry::{BroadcastSubscription, SubscriptionRegistry, TokenUpdate};
use crate::renderer::{LogRenderer, RevealAnimation, TokenRenderer};

const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct BroadcasterConfig {
    /// Channel names are `{channel_prefix}.{scope}`.
    pub channel_prefix: String,
    pub inactivity_threshold: Duration,
    pub inactivity_poll: Duration,
    pub reveal: RevealAnimation,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            channel_prefix: "presence".to_string(),
            inactivity_threshold: Duration::from_secs(13),
            inactivity_poll: Duration::from_secs(3),
            reveal: RevealAnimation::default(),
        }
    }
}

pub fn channel_name(prefix: &str, scope: &ScopeId) -> String {
    format!("{prefix}.{scope}")
}

/// Host page lifecycle notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageEvent {
    BeforeUnload,
    PageHide,
    Unload,
    VisibilityHidden,
    VisibilityVisible,
}

impl PageEvent {
    pub fn triggers_stop(&self) -> bool {
        !matches!(self, PageEvent::VisibilityVisible)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Inactivity,
    Page(PageEvent),
    /// Explicit stop by the host.
    Requested,
    /// The broadcaster was dropped while still running.
    Dropped,
    /// A channel could not be joined after the schedule started.
    LoadFailed,
}

/// Observable broadcaster activity.
#[derive(Clone, Debug, PartialEq)]
pub enum BroadcastEvent {
    TokenRotated(PresenceToken),
    Revealed(ScopeId),
    Stopped {
        reason: StopReason,
        scopes: Vec<ScopeId>,
    },
}

/// Coordinates token rotation for a set of scopes.
///
/// Shared as `Arc<PresenceBroadcaster>`; background tasks hold weak
/// references and end when the broadcaster stops or is dropped.
pub struct PresenceBroadcaster {
    config: BroadcasterConfig,
    backend: Arc<dyn ScheduleBackend>,
    transport: Arc<dyn PushTransport>,
    renderer: Arc<dyn TokenRenderer>,
    clock: Arc<dyn Clock>,
    registry: Mutex<SubscriptionRegistry>,
    /// Scopes handed to `start_schedule`; the stop signal covers exactly these.
    scheduled: Mutex<Vec<ScopeId>>,
    loaded: AtomicBool,
    stop_sent: AtomicBool,
    forwarders: Mutex<HashMap<ScopeId, JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<BroadcastEvent>,
    stats: StatsCounter,
}

impl PresenceBroadcaster {
    pub fn new(
        config: BroadcasterConfig,
        backend: Arc<dyn ScheduleBackend>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            config,
            backend,
            transport,
            renderer: Arc::new(LogRenderer),
            clock: Arc::new(SystemClock),
            registry: Mutex::new(SubscriptionRegistry::new()),
            scheduled: Mutex::new(Vec::new()),
            loaded: AtomicBool::new(false),
            stop_sent: AtomicBool::new(false),
            forwarders: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            events,
            stats: StatsCounter::new(&[
                "tokens",
                "reveals",
                "duplicate_subscribes",
                "stops",
                "suppressed_stops",
            ]),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TokenRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.events.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_sent.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<BroadcastSubscription> {
        self.lock_registry().snapshot()
    }

    pub fn current_token(&self, scope: &ScopeId) -> Option<PresenceToken> {
        self.lock_registry()
            .get(scope)
            .and_then(|sub| sub.current.clone())
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, SubscriptionRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the schedule for `scopes`, join their channels and start the
    /// inactivity monitor.
    pub async fn load(self: &Arc<Self>, scopes: &[ScopeId]) -> Result<(), BroadcastError> {
        let unique: Vec<ScopeId> = scopes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Err(BroadcastError::NoScopes);
        }
        if self.is_stopped() {
            return Err(BroadcastError::Stopped);
        }
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Err(BroadcastError::AlreadyLoaded);
        }

        if let Err(e) = self.backend.start_schedule(&unique).await {
            warn!(error = %e, "failed to start token schedule");
            self.loaded.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        // `stop` swaps `stop_sent` before taking `scheduled`, so under this
        // lock exactly one side sends the stop signal.
        {
            let mut scheduled = self.scheduled.lock().unwrap_or_else(|e| e.into_inner());
            if self.is_stopped() {
                drop(scheduled);
                info!("stopped while the schedule was starting");
                self.backend.signal_stop(&unique);
                return Ok(());
            }
            *scheduled = unique.clone();
        }
        info!(count = unique.len(), "broadcaster loaded");

        for scope in &unique {
            if self.is_stopped() {
                debug!("stopped during load; skipping remaining subscriptions");
                return Ok(());
            }
            if let Err(e) = self.subscribe(scope).await {
                warn!(scope = %scope, error = %e, "subscription failed; rolling back load");
                self.stop(StopReason::LoadFailed);
                return Err(e);
            }
        }

        let monitor = tokio::spawn(monitor_inactivity(
            Arc::downgrade(self),
            self.config.inactivity_poll,
        ));
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(monitor);
        Ok(())
    }

    /// Join the push channel for `scope`. Returns `false` if already joined.
    pub async fn subscribe(self: &Arc<Self>, scope: &ScopeId) -> Result<bool, BroadcastError> {
        if self.is_stopped() {
            return Err(BroadcastError::Stopped);
        }
        let channel = channel_name(&self.config.channel_prefix, scope);
        if !self
            .lock_registry()
            .subscribe(scope.clone(), channel.clone(), Instant::now())
        {
            self.stats.increment("duplicate_subscribes");
            debug!(scope = %scope, "already subscribed");
            return Ok(false);
        }

        let mut receiver = match self.transport.join(&channel).await {
            Ok(receiver) => receiver,
            Err(e) => {
                self.lock_registry().remove(scope);
                return Err(e);
            }
        };
        debug!(scope = %scope, channel = %channel, "subscribed");

        let weak = Arc::downgrade(self);
        let forward_scope = scope.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let Some(this) = weak.upgrade() else { break };
                        this.on_push(&forward_scope, event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(scope = %forward_scope, skipped, "push receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.forwarders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(scope.clone(), handle);
        Ok(true)
    }

    fn on_push(self: &Arc<Self>, scope: &ScopeId, event: PushEvent) {
        if self.is_stopped() {
            return;
        }
        let token = PresenceToken::new(scope.clone(), event.token, self.clock.now());
        let update = self.lock_registry().record_update(token.clone(), Instant::now());
        match update {
            TokenUpdate::UnknownScope => {
                debug!(scope = %scope, "rotation for untracked scope");
            }
            TokenUpdate::Unchanged => {
                debug!(scope = %scope, "token unchanged");
            }
            TokenUpdate::First | TokenUpdate::Rotated => {
                self.stats.increment("tokens");
                self.renderer.render(&token);
                let _ = self.events.send(BroadcastEvent::TokenRotated(token));
                if update == TokenUpdate::First {
                    self.start_reveal(scope.clone());
                }
            }
        }
    }

    fn start_reveal(self: &Arc<Self>, scope: ScopeId) {
        let weak = Arc::downgrade(self);
        let renderer = Arc::clone(&self.renderer);
        let reveal = self.config.reveal;
        let handle = tokio::spawn(async move {
            reveal.play(&scope, renderer.as_ref()).await;
            if let Some(this) = weak.upgrade() {
                this.stats.increment("reveals");
                debug!(scope = %scope, "reveal finished");
                let _ = this.events.send(BroadcastEvent::Revealed(scope));
            }
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Run one inactivity check. Returns `true` if this call sent the stop.
    pub fn check_inactivity(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        let idle = self
            .lock_registry()
            .all_idle(Instant::now(), self.config.inactivity_threshold);
        if !idle {
            return false;
        }
        info!(
            threshold_secs = self.config.inactivity_threshold.as_secs(),
            "all scopes inactive"
        );
        self.stop(StopReason::Inactivity)
    }

    pub fn handle_page_event(&self, event: PageEvent) -> bool {
        if !event.triggers_stop() {
            debug!(?event, "page event ignored");
            return false;
        }
        self.stop(StopReason::Page(event))
    }

    /// Signal the backend to stop, leave every channel and clear the registry.
    ///
    /// Only the first call for a load does anything; later calls return
    /// `false`.
    pub fn stop(&self, reason: StopReason) -> bool {
        if self.stop_sent.swap(true, Ordering::SeqCst) {
            self.stats.increment("suppressed_stops");
            debug!(?reason, "stop already sent");
            return false;
        }

        let scopes = std::mem::take(&mut *self.scheduled.lock().unwrap_or_else(|e| e.into_inner()));
        if !scopes.is_empty() {
            self.backend.signal_stop(&scopes);
        }

        let drained = self.lock_registry().clear();
        for sub in &drained {
            self.transport.leave(&sub.channel_name);
            self.renderer.clear(&sub.scope_id);
        }
        for (_, handle) in self
            .forwarders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
        {
            handle.abort();
        }
        for handle in self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            handle.abort();
        }

        self.stats.increment("stops");
        info!(?reason, count = scopes.len(), "broadcast stopped");
        let _ = self.events.send(BroadcastEvent::Stopped { reason, scopes });
        true
    }
}

impl Drop for PresenceBroadcaster {
    fn drop(&mut self) {
        if self.loaded.load(Ordering::SeqCst) && !self.is_stopped() {
            self.stop(StopReason::Dropped);
        }
    }
}

async fn monitor_inactivity(weak: Weak<PresenceBroadcaster>, poll: Duration) {
    let poll = poll.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(this) = weak.upgrade() else { break };
        if this.is_stopped() || this.check_inactivity() {
            break;
        }
    }
}
