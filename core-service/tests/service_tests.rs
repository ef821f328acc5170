//! Integration tests for the media service façade
//!
//! Actions go through `MediaService::execute` exactly as a host plugin would
//! send them; status envelopes are read back from a channel-backed
//! `StatusChannel`.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, MediaResource, MediaResourceFactory, MediaSource, PrepareMode, PrepareOutcome,
    ResourceEvent, ResourceListener, StatusChannel,
};
use core_runtime::config::MediaConfig;
use core_service::{status_envelope, MediaService, ServiceError};
use mockall::mock;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const LOCAL_A: &str = "/sdcard/Music/a.mp3";
const STREAM_B: &str = "https://radio.example.com/b";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct Listeners(Mutex<Vec<Arc<dyn ResourceListener>>>);

struct QuietResource {
    remote: bool,
    position_ms: u64,
}

impl MediaResource for QuietResource {
    fn set_source(&mut self, source: &MediaSource) -> BridgeResult<()> {
        self.remote = source.is_remote();
        Ok(())
    }

    fn prepare(&mut self, _mode: PrepareMode) -> BridgeResult<PrepareOutcome> {
        if self.remote {
            Ok(PrepareOutcome::Pending)
        } else {
            Ok(PrepareOutcome::Ready)
        }
    }

    fn start(&mut self) -> BridgeResult<()> {
        self.position_ms = 1_500;
        Ok(())
    }

    fn pause(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> BridgeResult<()> {
        self.position_ms = position_ms;
        Ok(())
    }

    fn set_volume(&mut self, _level: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn current_position_ms(&self) -> BridgeResult<u64> {
        Ok(self.position_ms)
    }

    fn duration_ms(&self) -> BridgeResult<Option<u64>> {
        Ok(Some(180_000))
    }

    fn release(&mut self) {}
}

#[derive(Default)]
struct QuietFactory {
    listeners: Listeners,
}

impl QuietFactory {
    fn listener(&self, instance: usize) -> Arc<dyn ResourceListener> {
        Arc::clone(&self.listeners.0.lock()[instance])
    }
}

impl MediaResourceFactory for QuietFactory {
    fn create(&self, listener: Arc<dyn ResourceListener>) -> BridgeResult<Box<dyn MediaResource>> {
        self.listeners.0.lock().push(listener);
        Ok(Box::new(QuietResource {
            remote: false,
            position_ms: 0,
        }))
    }
}

/// Status channel that hands every envelope to the test.
struct ForwardingChannel(mpsc::UnboundedSender<Value>);

impl StatusChannel for ForwardingChannel {
    fn send(&self, payload: Value) -> BridgeResult<()> {
        self.0
            .send(payload)
            .map_err(|_| BridgeError::OperationFailed("test receiver gone".to_string()))
    }
}

mock! {
    Channel {}

    impl StatusChannel for Channel {
        fn send(&self, payload: Value) -> BridgeResult<()>;
    }
}

struct Fixture {
    service: MediaService,
    factory: Arc<QuietFactory>,
    envelopes: mpsc::UnboundedReceiver<Value>,
}

impl Fixture {
    async fn new() -> Self {
        let factory = Arc::new(QuietFactory::default());
        let config = MediaConfig::builder()
            .resource_factory(factory.clone())
            .build()
            .unwrap();
        let service = MediaService::new(config).unwrap();

        let (tx, envelopes) = mpsc::unbounded_channel();
        service
            .execute(
                "messageChannel",
                &json!([]),
                Some(Arc::new(ForwardingChannel(tx))),
            )
            .await
            .unwrap();

        Self {
            service,
            factory,
            envelopes,
        }
    }

    async fn run(&self, action: &str, args: Value) -> Value {
        self.service.execute(action, &args, None).await.unwrap()
    }

    async fn next_status(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(2), self.envelopes.recv())
            .await
            .expect("status envelope in time")
            .expect("channel open")
    }

    /// Wait until session `id` handled everything sent so far.
    async fn settle(&self, id: &str) {
        self.service.registry().state(id).await;
    }

    async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.envelopes.recv()).await;
        assert!(next.is_err(), "unexpected status {:?}", next);
    }
}

fn status(id: &str, msg_type: u8, value: Value) -> Value {
    json!({
        "action": "status",
        "status": { "id": id, "msgType": msg_type, "value": value },
    })
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_play_local_file_reports_through_envelopes() {
    let mut fx = Fixture::new().await;

    let result = fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    assert_eq!(result, Value::Null);

    assert_eq!(fx.next_status().await, status("a", 1, json!(1)));
    assert_eq!(fx.next_status().await, status("a", 2, json!(180.0)));
    assert_eq!(fx.next_status().await, status("a", 1, json!(2)));
}

#[tokio::test]
async fn test_stream_prepares_asynchronously() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["b", STREAM_B])).await;
    assert_eq!(fx.next_status().await, status("b", 1, json!(1)));
    fx.settle("b").await;
    fx.assert_quiet().await;

    fx.factory.listener(0).on_event(ResourceEvent::Prepared);
    assert_eq!(fx.next_status().await, status("b", 2, json!(180.0)));
    assert_eq!(fx.next_status().await, status("b", 1, json!(2)));
}

#[tokio::test]
async fn test_position_and_duration_queries() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    for _ in 0..3 {
        fx.next_status().await;
    }

    let position = fx.run("getCurrentPositionAudio", json!(["a"])).await;
    assert_eq!(position, json!(1.5));
    assert_eq!(fx.next_status().await, status("a", 3, json!(1.5)));

    let duration = fx.run("getDurationAudio", json!(["a", LOCAL_A])).await;
    assert_eq!(duration, json!(180.0));

    assert_eq!(fx.run("getCurrentPositionAudio", json!(["ghost"])).await, json!(0.0));
}

#[tokio::test]
async fn test_seek_and_pause_and_stop() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    for _ in 0..3 {
        fx.next_status().await;
    }

    fx.run("seekToAudio", json!(["a", 42_000])).await;
    assert_eq!(fx.next_status().await, status("a", 3, json!(42.0)));

    fx.run("pausePlayingAudio", json!(["a"])).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(3)));

    fx.run("stopPlayingAudio", json!(["a"])).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(4)));
}

#[tokio::test]
async fn test_commands_for_unknown_sessions_are_silent() {
    let mut fx = Fixture::new().await;

    assert_eq!(fx.run("pausePlayingAudio", json!(["ghost"])).await, Value::Null);
    assert_eq!(fx.run("stopPlayingAudio", json!(["ghost"])).await, Value::Null);
    assert_eq!(fx.run("seekToAudio", json!(["ghost", 100])).await, Value::Null);
    assert_eq!(fx.run("setVolume", json!(["ghost", "0.3"])).await, Value::Null);
    assert_eq!(fx.run("release", json!(["ghost"])).await, json!(false));
    fx.assert_quiet().await;
}

#[tokio::test]
async fn test_create_then_release() {
    let fx = Fixture::new().await;

    fx.run("create", json!(["a", LOCAL_A])).await;
    assert_eq!(fx.service.registry().session_count(), 1);

    assert_eq!(fx.run("release", json!(["a"])).await, json!(true));
    assert_eq!(fx.service.registry().session_count(), 0);
}

#[tokio::test]
async fn test_blank_source_reports_unsupported_media() {
    let mut fx = Fixture::new().await;

    fx.run("create", json!(["a"])).await;
    fx.run("startPlayingAudio", json!(["a", "   "])).await;

    assert_eq!(fx.next_status().await, status("a", 1, json!(4)));
    assert_eq!(fx.next_status().await, status("a", 9, json!({ "code": 4 })));
}

#[tokio::test]
async fn test_native_error_is_forwarded_with_code() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["b", STREAM_B])).await;
    fx.next_status().await;

    fx.factory.listener(0).on_event(ResourceEvent::Error {
        what: 100,
        extra: -1004,
    });
    assert_eq!(fx.next_status().await, status("b", 1, json!(4)));
    assert_eq!(fx.next_status().await, status("b", 9, json!({ "code": 100 })));
}

#[tokio::test]
async fn test_invalid_actions() {
    let fx = Fixture::new().await;

    let err = fx
        .service
        .execute("startRecordingAudio", &json!(["a"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownAction(_)));

    let err = fx
        .service
        .execute("seekToAudio", &json!(["a", "later"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArguments { .. }));

    let err = fx
        .service
        .execute("messageChannel", &json!([]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArguments { .. }));
}

// ============================================================================
// Status channel
// ============================================================================

#[tokio::test]
async fn test_rebinding_replaces_previous_channel() {
    let mut fx = Fixture::new().await;

    let (tx, mut second) = mpsc::unbounded_channel();
    fx.service
        .register_status_channel(Arc::new(ForwardingChannel(tx)));

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    let first = tokio::time::timeout(Duration::from_secs(2), second.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, status("a", 1, json!(1)));

    // The old forwarder ends once its stream is replaced.
    let old = tokio::time::timeout(Duration::from_secs(2), fx.envelopes.recv())
        .await
        .unwrap();
    assert!(old.is_none());
}

#[tokio::test]
async fn test_channel_failures_do_not_stop_forwarding() {
    let fx = Fixture::new().await;

    let (tx, mut seen) = mpsc::unbounded_channel::<Value>();
    let mut channel = MockChannel::new();
    channel.expect_send().returning(move |payload| {
        tx.send(payload).ok();
        Err(BridgeError::OperationFailed("webview gone".to_string()))
    });
    fx.service.register_status_channel(Arc::new(channel));

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(2), seen.recv())
            .await
            .unwrap()
            .unwrap();
    }
}

#[test]
fn test_status_envelope_shape() {
    use core_runtime::events::{StatusEvent, StatusMessage};

    let message = StatusMessage::new("a", StatusEvent::Position(2.5));
    assert_eq!(status_envelope(&message), status("a", 3, json!(2.5)));
}

// ============================================================================
// Out-of-band signals
// ============================================================================

#[tokio::test]
async fn test_telephone_message_pauses_and_resumes() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    for _ in 0..3 {
        fx.next_status().await;
    }

    fx.service.on_message("telephone", &json!("ringing")).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(3)));

    fx.service.on_message("telephone", &json!("idle")).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(2)));

    fx.service.on_message("telephone", &json!("dialing")).await;
    fx.service.on_message("exit", &json!("ringing")).await;
    fx.settle("a").await;
    fx.assert_quiet().await;
}

#[tokio::test]
async fn test_focus_codes() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    for _ in 0..3 {
        fx.next_status().await;
    }

    fx.service.on_focus_change(-2).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(3)));

    fx.service.on_focus_change(0).await;
    fx.settle("a").await;
    fx.assert_quiet().await;

    fx.service.on_focus_change(1).await;
    assert_eq!(fx.next_status().await, status("a", 1, json!(2)));
}

#[tokio::test]
async fn test_reset_releases_everything() {
    let mut fx = Fixture::new().await;

    fx.run("startPlayingAudio", json!(["a", LOCAL_A])).await;
    fx.run("create", json!(["b", STREAM_B])).await;
    for _ in 0..3 {
        fx.next_status().await;
    }

    fx.service.on_reset().await;
    assert_eq!(fx.service.registry().session_count(), 0);
    // Only the running session reports STOPPED.
    assert_eq!(fx.next_status().await, status("a", 1, json!(4)));
    fx.assert_quiet().await;
}

#[tokio::test]
async fn test_destroy_unbinds_status_channel() {
    let mut fx = Fixture::new().await;

    fx.service.on_destroy().await;
    let closed = tokio::time::timeout(Duration::from_secs(2), fx.envelopes.recv())
        .await
        .unwrap();
    assert!(closed.is_none());
}

#[test]
fn test_service_requires_tokio_runtime() {
    let config = MediaConfig::builder()
        .resource_factory(Arc::new(QuietFactory::default()))
        .build()
        .unwrap();

    assert!(matches!(
        MediaService::new(config),
        Err(ServiceError::Playback(_))
    ));
}
