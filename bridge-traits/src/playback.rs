//! Media resource bridge traits and supporting playback types.
//!
//! A [`MediaResource`] wraps exactly one native decode/output handle (an
//! Android `MediaPlayer`, an `AVAudioPlayer`, a desktop decoder pipeline...).
//! The core never talks to the platform directly: it asks a
//! [`MediaResourceFactory`] for a fresh handle, drives it through the narrow
//! capability contract below and receives asynchronous notifications through
//! the [`ResourceListener`] handed over at creation time.
//!
//! All methods are synchronous. Implementations are expected to return quickly;
//! long-running work (network prepare, decoding) must happen on the platform's
//! own worker and report back through the listener.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolved location of the media a session plays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaSource {
    /// File on the local filesystem.
    LocalFile { path: PathBuf },
    /// File bundled with the host application, relative to its asset root.
    /// The reserved asset marker has already been stripped.
    Asset { path: String },
    /// Network stream (`http://`, `https://`, `rtsp://`).
    Stream { url: String },
}

impl MediaSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Stream { .. })
    }

    /// How the source should be prepared: remote content is never prepared on
    /// the calling thread.
    pub fn prepare_mode(&self) -> PrepareMode {
        if self.is_remote() {
            PrepareMode::Async
        } else {
            PrepareMode::Blocking
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::LocalFile { path } => write!(f, "{}", path.display()),
            MediaSource::Asset { path } => write!(f, "asset:{}", path),
            MediaSource::Stream { url } => write!(f, "{}", url),
        }
    }
}

/// Playback lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No resource allocated yet.
    None,
    /// Resource allocated, waiting for the prepared notification.
    Preparing,
    /// Prepared but never told to play.
    PausedPending,
    Running,
    Paused,
    Stopped,
    Ended,
    /// The resource faulted and has been released.
    Error,
}

impl PlaybackState {
    /// Ordinal understood by the scripting side of the bridge.
    ///
    /// `PausedPending` reports as paused and `Error` as stopped; the scripting
    /// side has no dedicated value for either.
    pub fn wire_ordinal(self) -> u8 {
        match self {
            PlaybackState::None => 0,
            PlaybackState::Preparing => 1,
            PlaybackState::Running => 2,
            PlaybackState::Paused | PlaybackState::PausedPending => 3,
            PlaybackState::Stopped | PlaybackState::Error => 4,
            PlaybackState::Ended => 5,
        }
    }

    /// Returns `true` for states in which the resource has been prepared and
    /// accepts transport commands.
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            PlaybackState::PausedPending
                | PlaybackState::Running
                | PlaybackState::Paused
                | PlaybackState::Stopped
                | PlaybackState::Ended
        )
    }
}

/// How a resource should load its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    /// Prepare on the calling thread (local files and bundled assets).
    Blocking,
    /// Prepare in the background and report through [`ResourceEvent::Prepared`].
    Async,
}

/// Result of [`MediaResource::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// The resource is ready; no prepared notification will follow.
    Ready,
    /// Preparation continues in the background.
    Pending,
}

/// Notification delivered by a resource from its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    Prepared,
    Completed,
    /// `what` is the platform error category, `extra` the detail code.
    Error { what: i32, extra: i32 },
}

/// Receiver for [`ResourceEvent`]s.
///
/// Events for one resource instance must be delivered in order and never
/// concurrently with each other. Implementations must not block.
pub trait ResourceListener: Send + Sync {
    fn on_event(&self, event: ResourceEvent);
}

/// Capability contract for a single native decode/output handle.
pub trait MediaResource: Send {
    /// Point the resource at the media to play.
    fn set_source(&mut self, source: &MediaSource) -> Result<()>;

    /// Load the configured source.
    ///
    /// With [`PrepareMode::Blocking`] this runs on a runtime worker thread
    /// (moved out of the scheduler on a multi-threaded runtime), so it should
    /// only do local I/O. Anything that may wait on the network belongs to
    /// [`PrepareMode::Async`] and must return [`PrepareOutcome::Pending`].
    fn prepare(&mut self, mode: PrepareMode) -> Result<PrepareOutcome>;

    /// Begin or resume output at the current position.
    fn start(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Halt output; the resource is about to be released.
    fn stop(&mut self) -> Result<()>;

    /// Seek to an absolute position in milliseconds.
    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Set output gain for both channels (`0.0..=1.0`).
    fn set_volume(&mut self, level: f32) -> Result<()>;

    fn current_position_ms(&self) -> Result<u64>;

    /// Total duration, `None` when the platform cannot tell (live streams).
    fn duration_ms(&self) -> Result<Option<u64>>;

    /// Free the native handle. Must be safe to call from any state.
    fn release(&mut self);
}

/// Allocates native resources for sessions.
pub trait MediaResourceFactory: Send + Sync {
    /// Allocate a fresh handle wired to `listener`.
    fn create(&self, listener: Arc<dyn ResourceListener>) -> Result<Box<dyn MediaResource>>;
}
