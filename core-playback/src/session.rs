//! # Session State Machine
//!
//! Lifecycle of a single playback session and the native resource backing it.
//!
//! ## Overview
//!
//! [`SessionStateMachine`] is synchronous and single-owner: the session actor
//! feeds it caller commands and resource callbacks one at a time, so no two
//! entry points ever interleave. Every transition that the scripting side can
//! observe is reported through the injected [`EventSink`].
//!
//! ## States
//!
//! ```text
//! NONE ──play──> PREPARING ──prepared──> RUNNING | PAUSED_PENDING
//! RUNNING ──pause──> PAUSED ──play──> RUNNING
//! RUNNING | PAUSED ──stop──> STOPPED ──play──> RUNNING (same source)
//! RUNNING ──completed──> ENDED ──play──> RUNNING (from the start)
//! any ──fault──> ERROR ──play──> PREPARING (fresh resource)
//! ```
//!
//! ## Deferred commands
//!
//! Nothing is issued to a resource before it reports `prepared`. A play or
//! seek that arrives earlier is recorded in the session's [`DeferredIntent`]
//! and replayed exactly once when the prepared notification is handled.
//!
//! ## Resource generations
//!
//! Each resource instance is tagged with a fresh generation number. Callbacks
//! carrying any other generation belong to a released resource and are
//! rejected with [`PlaybackError::UnexpectedCallback`].

use crate::error::{PlaybackError, Result};
use crate::intent::DeferredIntent;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    MediaResource, MediaResourceFactory, MediaSource, PlaybackState, PrepareMode,
    PrepareOutcome, ResourceEvent, ResourceListener,
};
use core_runtime::events::{EventSink, StatusEvent, StatusMessage};
use core_runtime::logging::redact_source;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

/// Gain a freshly created native resource starts with.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Duration reported while it is not known.
pub const UNKNOWN_DURATION: f64 = -1.0;

fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Hands out the listener a new resource instance reports through.
pub trait CallbackRouter: Send + Sync {
    fn listener(&self, generation: u64) -> Arc<dyn ResourceListener>;
}

/// Point-in-time view of a session, readable without going through its actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub volume: f32,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::None,
            volume: DEFAULT_VOLUME,
            position_ms: 0,
            duration_ms: None,
        }
    }
}

struct LiveResource {
    handle: Box<dyn MediaResource>,
    generation: u64,
    prepared: bool,
}

pub struct SessionStateMachine {
    id: String,
    source: Option<MediaSource>,
    state: PlaybackState,
    resource: Option<LiveResource>,
    next_generation: u64,
    intent: DeferredIntent,
    volume: f32,
    position_ms: u64,
    duration_ms: Option<u64>,
    destroyed: bool,
    factory: Arc<dyn MediaResourceFactory>,
    sink: Arc<dyn EventSink>,
    router: Arc<dyn CallbackRouter>,
}

impl SessionStateMachine {
    pub fn new(
        id: impl Into<String>,
        source: Option<MediaSource>,
        factory: Arc<dyn MediaResourceFactory>,
        sink: Arc<dyn EventSink>,
        router: Arc<dyn CallbackRouter>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            state: PlaybackState::None,
            resource: None,
            next_generation: 0,
            intent: DeferredIntent::default(),
            volume: DEFAULT_VOLUME,
            position_ms: 0,
            duration_ms: None,
            destroyed: false,
            factory,
            sink,
            router,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn intent(&self) -> DeferredIntent {
        self.intent
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            volume: self.volume,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        }
    }

    /// Generation of the resource still waiting for its prepared notification.
    pub fn pending_prepare(&self) -> Option<u64> {
        self.resource
            .as_ref()
            .filter(|live| !live.prepared)
            .map(|live| live.generation)
    }

    fn is_prepared(&self) -> bool {
        self.resource
            .as_ref()
            .map(|live| live.prepared)
            .unwrap_or(false)
    }

    // ========================================================================
    // Caller commands
    // ========================================================================

    /// Start or resume playback, loading `source` first when the session
    /// can accept a new one.
    pub fn request_play(&mut self, source: Option<MediaSource>) {
        if self.destroyed {
            debug!(session = %self.id, "Play ignored on destroyed session");
            return;
        }

        if let Some(source) = source {
            self.adopt_source(source);
        }

        match self.state {
            PlaybackState::Running => {
                debug!(session = %self.id, "Already running");
            }
            PlaybackState::Preparing => {
                self.intent.record_play();
            }
            PlaybackState::PausedPending | PlaybackState::Paused | PlaybackState::Stopped => {
                self.start();
            }
            PlaybackState::Ended if !self.is_prepared() => {
                // Only reachable through a resource that never finished
                // preparing; wait for it instead of touching it.
                debug!(session = %self.id, "Play deferred until prepared");
                self.intent.record_play();
            }
            PlaybackState::Ended => {
                if self.transport("seek_to", |r| r.seek_to(0)) {
                    self.position_ms = 0;
                    self.start();
                }
            }
            PlaybackState::None | PlaybackState::Error => self.load(true),
        }
    }

    /// Pause a running session. While preparing, this cancels the pending
    /// play request instead.
    pub fn request_pause(&mut self) {
        match self.state {
            PlaybackState::Running => {
                if self.transport("pause", |r| r.pause()) {
                    self.set_state(PlaybackState::Paused);
                }
            }
            PlaybackState::Preparing => {
                if self.intent.pending_play {
                    debug!(session = %self.id, "Pause while preparing cancels pending play");
                }
                self.intent.cancel_play();
            }
            state => {
                debug!(session = %self.id, ?state, "Pause ignored");
            }
        }
    }

    /// Pause only if running. Returns whether the session was paused.
    pub fn pause_if_running(&mut self) -> bool {
        if self.state != PlaybackState::Running {
            return false;
        }
        self.request_pause();
        self.state == PlaybackState::Paused
    }

    pub fn request_stop(&mut self) {
        if !matches!(self.state, PlaybackState::Running | PlaybackState::Paused) {
            debug!(session = %self.id, state = ?self.state, "Stop ignored");
            return;
        }

        if !self.transport("pause", |r| r.pause()) {
            return;
        }
        if !self.transport("seek_to", |r| r.seek_to(0)) {
            return;
        }
        self.position_ms = 0;
        self.set_state(PlaybackState::Stopped);
    }

    /// Seek to `position_ms`. Deferred until the resource is prepared; never
    /// starts playback.
    pub fn request_seek(&mut self, position_ms: u64) {
        if self.destroyed {
            return;
        }

        if !self.is_prepared() {
            debug!(session = %self.id, position_ms, "Deferring seek until prepared");
            self.intent.record_seek(position_ms);
            return;
        }

        if !self.transport("seek_to", |r| r.seek_to(position_ms)) {
            return;
        }
        self.position_ms = position_ms;
        self.emit(StatusEvent::Position(ms_to_seconds(position_ms)));

        // Repositioned media is no longer at its end.
        if self.state == PlaybackState::Ended {
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn request_set_volume(&mut self, level: f32) {
        if (level - self.volume).abs() < f32::EPSILON {
            return;
        }
        self.volume = level;

        if self.is_prepared() {
            self.transport("set_volume", |r| r.set_volume(level));
        } else {
            debug!(session = %self.id, level, "Volume cached until prepared");
        }
    }

    /// Current position in milliseconds. Emits a POSITION event when the value
    /// differs from the previous read.
    pub fn query_position(&mut self) -> u64 {
        if !matches!(self.state, PlaybackState::Running | PlaybackState::Paused) {
            return 0;
        }

        let read = match self
            .resource
            .as_ref()
            .map(|live| live.handle.current_position_ms())
        {
            Some(Ok(position)) => position,
            Some(Err(error)) => {
                warn!(session = %self.id, %error, "Failed to read position");
                return self.position_ms;
            }
            None => return 0,
        };

        let position = if self.state == PlaybackState::Running {
            read.max(self.position_ms)
        } else {
            read
        };

        if position != self.position_ms {
            self.position_ms = position;
            self.emit(StatusEvent::Position(ms_to_seconds(position)));
        }
        position
    }

    /// Duration in seconds.
    ///
    /// Without a resource this starts loading (without play intent) and
    /// returns `0.0`; the value follows as a DURATION event. While preparing
    /// the duration is unknown (`-1.0`). Once prepared the cached value is
    /// returned and re-emitted.
    pub fn query_duration(&mut self, source: Option<MediaSource>) -> f64 {
        if self.destroyed {
            return 0.0;
        }

        if self.resource.is_none() {
            if let Some(source) = source {
                self.adopt_source(source);
            }
            self.load(false);
            return 0.0;
        }

        if !self.is_prepared() {
            return UNKNOWN_DURATION;
        }

        let duration = self.duration_seconds();
        self.emit(StatusEvent::Duration(duration));
        duration
    }

    /// Stop if playing and release the resource. Returns `false` when the
    /// session was already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }

        if matches!(self.state, PlaybackState::Running | PlaybackState::Paused) {
            if let Some(live) = self.resource.as_mut() {
                if let Err(error) = live.handle.stop() {
                    warn!(session = %self.id, %error, "Failed to stop resource");
                }
            }
            self.set_state(PlaybackState::Stopped);
        }

        self.release_resource();
        self.intent.clear();
        self.destroyed = true;
        info!(session = %self.id, "Session destroyed");
        true
    }

    // ========================================================================
    // Resource callbacks
    // ========================================================================

    pub fn on_resource_event(&mut self, generation: u64, event: ResourceEvent) -> Result<()> {
        let prepared = match self.resource.as_ref() {
            Some(live) if !self.destroyed && live.generation == generation => live.prepared,
            _ => return Err(PlaybackError::UnexpectedCallback(generation)),
        };

        match event {
            ResourceEvent::Prepared => {
                if prepared {
                    return Err(PlaybackError::UnexpectedCallback(generation));
                }
                self.on_prepared();
            }
            ResourceEvent::Completed => {
                // Completion before prepared is out of order.
                if !prepared {
                    return Err(PlaybackError::UnexpectedCallback(generation));
                }
                self.on_completion();
            }
            ResourceEvent::Error { what, extra } => {
                self.fault(PlaybackError::NativeFault { what, extra });
            }
        }
        Ok(())
    }

    /// Fault the session if resource `generation` is still preparing. Returns
    /// whether the deadline fired.
    pub fn on_prepare_deadline(&mut self, generation: u64, timeout: Duration) -> bool {
        if self.pending_prepare() != Some(generation) {
            return false;
        }
        self.fault(PlaybackError::PrepareTimedOut(timeout));
        true
    }

    fn on_prepared(&mut self) {
        let Some(live) = self.resource.as_mut() else {
            return;
        };
        live.prepared = true;
        debug!(session = %self.id, generation = live.generation, "Resource prepared");

        if let Some(target) = self.intent.take_seek() {
            if !self.transport("seek_to", |r| r.seek_to(target)) {
                return;
            }
            self.position_ms = target;
            self.emit(StatusEvent::Position(ms_to_seconds(target)));
        }

        self.duration_ms = match self.resource.as_ref().map(|live| live.handle.duration_ms()) {
            Some(Ok(duration)) => duration,
            Some(Err(error)) => {
                warn!(session = %self.id, %error, "Failed to read duration");
                None
            }
            None => None,
        };
        self.emit(StatusEvent::Duration(self.duration_seconds()));

        if (self.volume - DEFAULT_VOLUME).abs() >= f32::EPSILON {
            let level = self.volume;
            if !self.transport("set_volume", |r| r.set_volume(level)) {
                return;
            }
        }

        if self.intent.take_play() {
            self.start();
        } else {
            self.set_state(PlaybackState::PausedPending);
        }
    }

    fn on_completion(&mut self) {
        self.set_state(PlaybackState::Ended);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn adopt_source(&mut self, source: MediaSource) {
        if self.source.as_ref() == Some(&source) {
            return;
        }

        match self.state {
            PlaybackState::None
            | PlaybackState::Error
            | PlaybackState::Stopped
            | PlaybackState::Ended => {
                info!(
                    session = %self.id,
                    source = %redact_source(&source.to_string()),
                    "Switching media source"
                );
                self.release_resource();
                self.duration_ms = None;
                self.position_ms = 0;
                self.source = Some(source);
                // The next load reports PREPARING.
                self.state = PlaybackState::None;
            }
            state => {
                debug!(session = %self.id, ?state, "New source ignored while busy");
            }
        }
    }

    fn load(&mut self, play: bool) {
        let Some(source) = self.source.clone() else {
            self.fault(PlaybackError::InvalidSource(
                "session has no media location".to_string(),
            ));
            return;
        };

        self.release_resource();

        let generation = self.next_generation;
        self.next_generation += 1;

        let mut handle = match self.factory.create(self.router.listener(generation)) {
            Ok(handle) => handle,
            Err(error) => {
                self.fault(PlaybackError::ResourceCreationFailed(error));
                return;
            }
        };

        let location = redact_source(&source.to_string());
        if let Err(error) = handle.set_source(&source) {
            handle.release();
            self.fault(PlaybackError::SourceLoadFailed { location, error });
            return;
        }

        self.duration_ms = None;
        self.position_ms = 0;
        if play {
            self.intent.record_play();
        }
        self.set_state(PlaybackState::Preparing);
        debug!(session = %self.id, generation, source = %location, "Preparing resource");

        let live = self.resource.insert(LiveResource {
            handle,
            generation,
            prepared: false,
        });

        let outcome = prepare_resource(&mut live.handle, source.prepare_mode());
        match outcome {
            Ok(PrepareOutcome::Ready) => self.on_prepared(),
            Ok(PrepareOutcome::Pending) => {}
            Err(error) => self.fault(PlaybackError::SourceLoadFailed { location, error }),
        }
    }

    fn start(&mut self) {
        if self.resource.is_none() {
            self.load(true);
            return;
        }
        if self.transport("start", |r| r.start()) {
            self.set_state(PlaybackState::Running);
        }
    }

    /// Run a transport call on the live resource. A failing call faults the
    /// session and yields `false`.
    fn transport<F>(&mut self, operation: &'static str, call: F) -> bool
    where
        F: FnOnce(&mut Box<dyn MediaResource>) -> BridgeResult<()>,
    {
        let Some(live) = self.resource.as_mut() else {
            debug!(session = %self.id, operation, "No live resource");
            return false;
        };

        match call(&mut live.handle) {
            Ok(()) => true,
            Err(error) => {
                self.fault(PlaybackError::ResourceOperation { operation, error });
                false
            }
        }
    }

    fn fault(&mut self, error: PlaybackError) {
        let code = error.status_code();
        warn!(session = %self.id, %error, code, "Playback fault");

        self.release_resource();
        self.intent.clear();
        self.duration_ms = None;
        self.position_ms = 0;
        self.set_state(PlaybackState::Error);
        self.emit(StatusEvent::Error { code });
    }

    fn release_resource(&mut self) {
        if let Some(mut live) = self.resource.take() {
            debug!(session = %self.id, generation = live.generation, "Releasing resource");
            live.handle.release();
        }
    }

    fn duration_seconds(&self) -> f64 {
        self.duration_ms
            .map(ms_to_seconds)
            .unwrap_or(UNKNOWN_DURATION)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!(session = %self.id, from = ?self.state, to = ?state, "State transition");
        self.state = state;
        self.emit(StatusEvent::StateChanged(state));
    }

    fn emit(&self, event: StatusEvent) {
        self.sink.emit(StatusMessage::new(self.id.clone(), event));
    }
}

/// Run `prepare` on the resource. A blocking prepare on a multi-threaded
/// runtime moves the current worker out of the scheduler while it waits.
fn prepare_resource(
    handle: &mut Box<dyn MediaResource>,
    mode: PrepareMode,
) -> BridgeResult<PrepareOutcome> {
    let multi_thread = Handle::try_current()
        .map(|runtime| runtime.runtime_flavor() == RuntimeFlavor::MultiThread)
        .unwrap_or(false);

    if mode == PrepareMode::Blocking && multi_thread {
        tokio::task::block_in_place(|| handle.prepare(mode))
    } else {
        handle.prepare(mode)
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        self.release_resource();
    }
}
