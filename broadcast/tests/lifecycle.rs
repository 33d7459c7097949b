//! Broadcaster lifecycle against in-process doubles, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rollcall_backend::BackendError;
use rollcall_broadcast::{
    channel_name, BroadcastError, BroadcastEvent, BroadcasterConfig, LocalChannelHub, PageEvent,
    PresenceBroadcaster, PushEvent, PushTransport, StopReason,
};
use rollcall_nullables::{NullRenderer, NullScheduleBackend};
use rollcall_types::ScopeId;

struct Fixture {
    backend: Arc<NullScheduleBackend>,
    hub: Arc<LocalChannelHub>,
    renderer: Arc<NullRenderer>,
    broadcaster: Arc<PresenceBroadcaster>,
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(NullScheduleBackend::new()))
}

fn fixture_with(backend: Arc<NullScheduleBackend>) -> Fixture {
    let hub = Arc::new(LocalChannelHub::default());
    let renderer = Arc::new(NullRenderer::new());
    let broadcaster = Arc::new(
        PresenceBroadcaster::new(BroadcasterConfig::default(), backend.clone(), hub.clone())
            .with_renderer(renderer.clone()),
    );
    Fixture {
        backend,
        hub,
        renderer,
        broadcaster,
    }
}

fn scopes(ids: &[&str]) -> Vec<ScopeId> {
    ids.iter().map(|id| ScopeId::new(*id)).collect()
}

fn channel(scope: &str) -> String {
    channel_name("presence", &ScopeId::new(scope))
}

/// Local hub that refuses to join one channel.
struct RefusingTransport {
    hub: Arc<LocalChannelHub>,
    refused: String,
}

#[async_trait]
impl PushTransport for RefusingTransport {
    async fn join(
        &self,
        channel: &str,
    ) -> Result<tokio::sync::broadcast::Receiver<PushEvent>, BroadcastError> {
        if channel == self.refused {
            return Err(BroadcastError::Transport(format!("join refused for {channel}")));
        }
        self.hub.join(channel).await
    }

    fn leave(&self, channel: &str) {
        self.hub.leave(channel);
    }
}

/// Let spawned forwarders run.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn load_starts_schedule_once_with_all_scopes() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s2", "s1", "s2"])).await.unwrap();

    assert_eq!(f.backend.starts(), vec![scopes(&["s1", "s2"])]);
    assert_eq!(f.broadcaster.subscriptions().len(), 2);
    assert!(f.hub.is_joined(&channel("s1")));
    assert!(f.hub.is_joined(&channel("s2")));
}

#[tokio::test(start_paused = true)]
async fn duplicate_subscribe_is_a_noop() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();

    assert!(!f.broadcaster.subscribe(&ScopeId::new("s1")).await.unwrap());
    assert_eq!(f.hub.subscriber_count(&channel("s1")), 1);
    assert_eq!(f.broadcaster.stats().get("duplicate_subscribes"), 1);
}

#[tokio::test(start_paused = true)]
async fn inactivity_stops_exactly_once() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1", "s2"])).await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(f.backend.stop_calls(), 0);

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(f.backend.stop_calls(), 1);
    assert_eq!(f.backend.stops()[0], scopes(&["s1", "s2"]));
    assert!(f.broadcaster.subscriptions().is_empty());
    assert!(!f.hub.is_joined(&channel("s1")));

    for _ in 0..5 {
        assert!(!f.broadcaster.check_inactivity());
    }
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.backend.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rotations_keep_the_schedule_alive() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();

    for i in 0..6 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        f.hub.publish(&channel("s1"), format!("tok-{i}"));
        settle().await;
    }
    assert_eq!(f.backend.stop_calls(), 0);
    assert_eq!(f.renderer.rendered().len(), 6);
    assert_eq!(
        f.broadcaster
            .current_token(&ScopeId::new("s1"))
            .unwrap()
            .token_value,
        "tok-5"
    );

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(f.backend.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn first_token_reveals_once() {
    let f = fixture();
    let mut events = f.broadcaster.subscribe_events();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();

    f.hub.publish(&channel("s1"), "tok-a");
    settle().await;
    tokio::time::sleep(Duration::from_millis(900)).await;
    f.hub.publish(&channel("s1"), "tok-b");
    settle().await;
    tokio::time::sleep(Duration::from_millis(900)).await;

    let frames = f.renderer.reveal_frames(&ScopeId::new("s1"));
    assert_eq!(frames.first(), Some(&0.0));
    assert_eq!(frames.last(), Some(&1.0));
    assert_eq!(frames.iter().filter(|x| **x == 0.0).count(), 1);

    let mut reveals = 0;
    let mut rotations = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            BroadcastEvent::Revealed(_) => reveals += 1,
            BroadcastEvent::TokenRotated(_) => rotations += 1,
            BroadcastEvent::Stopped { .. } => {}
        }
    }
    assert_eq!(reveals, 1);
    assert_eq!(rotations, 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_token_value_is_not_re_rendered() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();

    f.hub.publish(&channel("s1"), "same");
    f.hub.publish(&channel("s1"), "same");
    settle().await;
    assert_eq!(f.renderer.rendered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn every_navigation_event_shares_one_stop() {
    let f = fixture();
    let mut events = f.broadcaster.subscribe_events();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();

    assert!(!f.broadcaster.handle_page_event(PageEvent::VisibilityVisible));
    assert!(f.broadcaster.handle_page_event(PageEvent::BeforeUnload));
    assert!(!f.broadcaster.handle_page_event(PageEvent::PageHide));
    assert!(!f.broadcaster.handle_page_event(PageEvent::Unload));
    assert!(!f.broadcaster.handle_page_event(PageEvent::VisibilityHidden));
    assert!(!f.broadcaster.check_inactivity());

    assert_eq!(f.backend.stop_calls(), 1);
    assert_eq!(f.renderer.cleared(), scopes(&["s1"]));
    assert_eq!(f.broadcaster.stats().get("suppressed_stops"), 3);
    assert_eq!(
        events.try_recv().unwrap(),
        BroadcastEvent::Stopped {
            reason: StopReason::Page(PageEvent::BeforeUnload),
            scopes: scopes(&["s1"]),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn tokens_after_stop_are_ignored() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();
    f.broadcaster.stop(StopReason::Requested);

    assert_eq!(f.hub.publish(&channel("s1"), "late"), 0);
    settle().await;
    assert!(f.renderer.rendered().is_empty());
    assert!(matches!(
        f.broadcaster.load(&scopes(&["s1"])).await,
        Err(BroadcastError::Stopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_start_leaves_nothing_subscribed() {
    let backend = Arc::new(NullScheduleBackend::failing_start(BackendError::Unreachable(
        "connection refused".into(),
    )));
    let f = fixture_with(backend);

    let err = f.broadcaster.load(&scopes(&["s1"])).await.unwrap_err();
    assert!(matches!(err, BroadcastError::Backend(_)));
    assert!(f.broadcaster.subscriptions().is_empty());

    // Nothing was scheduled, so stopping has nothing to signal.
    assert!(f.broadcaster.stop(StopReason::Requested));
    assert_eq!(f.backend.stop_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_scope_list_is_rejected() {
    let f = fixture();
    assert!(matches!(
        f.broadcaster.load(&[]).await,
        Err(BroadcastError::NoScopes)
    ));
    assert!(f.backend.starts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_a_running_broadcaster_stops_the_schedule() {
    let f = fixture();
    f.broadcaster.load(&scopes(&["s1"])).await.unwrap();
    let backend = f.backend.clone();
    drop(f);
    settle().await;
    assert_eq!(backend.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_subscription_stops_the_started_schedule() {
    let backend = Arc::new(NullScheduleBackend::new());
    let hub = Arc::new(LocalChannelHub::default());
    let transport = Arc::new(RefusingTransport {
        hub: hub.clone(),
        refused: channel("s2"),
    });
    let broadcaster = Arc::new(PresenceBroadcaster::new(
        BroadcasterConfig::default(),
        backend.clone(),
        transport,
    ));
    let mut events = broadcaster.subscribe_events();

    let err = broadcaster.load(&scopes(&["s1", "s2"])).await.unwrap_err();
    assert!(matches!(err, BroadcastError::Transport(_)));
    assert_eq!(backend.starts(), vec![scopes(&["s1", "s2"])]);
    assert_eq!(backend.stops(), vec![scopes(&["s1", "s2"])]);
    assert!(broadcaster.is_stopped());
    assert!(broadcaster.subscriptions().is_empty());
    assert!(!hub.is_joined(&channel("s1")));
    assert_eq!(
        events.recv().await.unwrap(),
        BroadcastEvent::Stopped {
            reason: StopReason::LoadFailed,
            scopes: scopes(&["s1", "s2"]),
        }
    );

    // No monitor or Drop path sends a second stop later.
    tokio::time::sleep(Duration::from_secs(120)).await;
    drop(broadcaster);
    settle().await;
    assert_eq!(backend.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_start_is_sent_after_the_start_resolves() {
    let backend =
        Arc::new(NullScheduleBackend::new().with_start_delay(Duration::from_millis(500)));
    let f = fixture_with(backend);

    let load = tokio::spawn({
        let broadcaster = f.broadcaster.clone();
        async move { broadcaster.load(&scopes(&["s1"])).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.backend.starts().len(), 1);

    assert!(f.broadcaster.handle_page_event(PageEvent::PageHide));
    assert_eq!(f.backend.stop_calls(), 0, "stop must not overtake the start");

    load.await.unwrap().unwrap();
    assert_eq!(f.backend.stops(), vec![scopes(&["s1"])]);
    assert!(f.broadcaster.subscriptions().is_empty());
    assert!(!f.hub.is_joined(&channel("s1")));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.backend.stop_calls(), 1);
}
