//! # Status Event System
//!
//! Delivers playback status notifications from sessions to the scripting
//! side of the host bridge.
//!
//! ## Overview
//!
//! The event system consists of:
//! - **Event Types**: [`StatusEvent`], one payload per kind, wrapped in a
//!   [`StatusMessage`] that carries the session id
//! - **EventSink**: The narrow emission trait every session is handed
//! - **StatusBus**: Single-listener sink backed by an unbounded `tokio::sync::mpsc` channel
//! - **StatusStream**: Receiving end of the currently bound listener
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    emit     ┌───────────┐                 ┌──────────────┐
//! │ Session a ├────────────>│           │                 │              │
//! └───────────┘             │ StatusBus │    recv()       │ StatusStream │
//!                           │  (mpsc,   ├────────────────>│  (scripting  │
//! ┌───────────┐    emit     │  1 slot)  │                 │   channel)   │
//! │ Session b ├────────────>│           │                 │              │
//! └───────────┘             └───────────┘                 └──────────────┘
//! ```
//!
//! ## Wire Format
//!
//! A [`StatusMessage`] serializes to the object the scripting side expects:
//!
//! ```json
//! {"id": "a", "msgType": 1, "value": 2}
//! {"id": "a", "msgType": 9, "value": {"code": 1}}
//! ```
//!
//! ## Delivery Semantics
//!
//! - Events from one session arrive in the order they were emitted.
//! - At most one listener is bound. Binding a new one closes the previous stream.
//! - While no listener is bound, events are dropped silently.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventSink, StatusBus, StatusEvent, StatusMessage};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = StatusBus::new();
//! let mut stream = bus.register_channel();
//!
//! bus.emit(StatusMessage::new("a", StatusEvent::Position(1.5)));
//!
//! let message = stream.recv().await.unwrap();
//! assert_eq!(message.session_id, "a");
//! # }
//! ```

use bridge_traits::PlaybackState;
use parking_lot::Mutex;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::fmt;
use tokio::sync::mpsc;

/// Message type for state changes.
pub const MSG_STATE: u8 = 1;
/// Message type for duration updates.
pub const MSG_DURATION: u8 = 2;
/// Message type for position updates.
pub const MSG_POSITION: u8 = 3;
/// Message type for errors.
pub const MSG_ERROR: u8 = 9;

// ============================================================================
// Event Types
// ============================================================================

/// Kind of a status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    State,
    Duration,
    Position,
    Error,
}

impl StatusKind {
    /// Numeric message type understood by the scripting side.
    pub fn msg_type(self) -> u8 {
        match self {
            StatusKind::State => MSG_STATE,
            StatusKind::Duration => MSG_DURATION,
            StatusKind::Position => MSG_POSITION,
            StatusKind::Error => MSG_ERROR,
        }
    }
}

/// Status notification payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusEvent {
    /// The session entered a new lifecycle state.
    StateChanged(PlaybackState),
    /// Media duration in seconds. `-1.0` means unknown.
    Duration(f64),
    /// Playback position in seconds.
    Position(f64),
    /// A resource fault; `code` is a `MEDIA_ERR_*` value or the native code.
    Error { code: i32 },
}

impl StatusEvent {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusEvent::StateChanged(_) => StatusKind::State,
            StatusEvent::Duration(_) => StatusKind::Duration,
            StatusEvent::Position(_) => StatusKind::Position,
            StatusEvent::Error { .. } => StatusKind::Error,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            StatusEvent::StateChanged(_) => "State changed",
            StatusEvent::Duration(_) => "Duration reported",
            StatusEvent::Position(_) => "Position reported",
            StatusEvent::Error { .. } => "Playback error",
        }
    }
}

struct ErrorValue {
    code: i32,
}

impl Serialize for ErrorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("code", &self.code)?;
        map.end()
    }
}

/// Status notification addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub session_id: String,
    pub event: StatusEvent,
}

impl StatusMessage {
    pub fn new(session_id: impl Into<String>, event: StatusEvent) -> Self {
        Self {
            session_id: session_id.into(),
            event,
        }
    }

    pub fn msg_type(&self) -> u8 {
        self.event.kind().msg_type()
    }
}

impl Serialize for StatusMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StatusMessage", 3)?;
        state.serialize_field("id", &self.session_id)?;
        state.serialize_field("msgType", &self.msg_type())?;
        match self.event {
            StatusEvent::StateChanged(playback) => {
                state.serialize_field("value", &playback.wire_ordinal())?
            }
            StatusEvent::Duration(seconds) | StatusEvent::Position(seconds) => {
                state.serialize_field("value", &seconds)?
            }
            StatusEvent::Error { code } => {
                state.serialize_field("value", &ErrorValue { code })?
            }
        }
        state.end()
    }
}

// ============================================================================
// Event Sink
// ============================================================================

/// Destination for session status notifications.
///
/// Emission never blocks and never fails from the caller's point of view.
pub trait EventSink: Send + Sync {
    fn emit(&self, message: StatusMessage);
}

/// Single-listener [`EventSink`].
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventSink, StatusBus, StatusEvent, StatusMessage};
///
/// let bus = StatusBus::new();
/// // Nobody is listening: the event is dropped.
/// bus.emit(StatusMessage::new("a", StatusEvent::Error { code: 1 }));
/// assert!(!bus.is_bound());
/// ```
#[derive(Default)]
pub struct StatusBus {
    sender: Mutex<Option<mpsc::UnboundedSender<StatusMessage>>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new listener, replacing (and closing) any previous one.
    pub fn register_channel(&self) -> StatusStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.sender.lock().replace(tx);
        if previous.is_some() {
            tracing::debug!("Replacing bound status channel");
        }
        StatusStream { receiver: rx }
    }

    /// Detaches the current listener, if any.
    pub fn unregister(&self) {
        self.sender.lock().take();
    }

    /// Returns `true` while a live listener is bound.
    pub fn is_bound(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

impl EventSink for StatusBus {
    fn emit(&self, message: StatusMessage) {
        let mut guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            tracing::trace!(session = %message.session_id, "No status channel bound, dropping event");
            return;
        };

        if tx.send(message).is_err() {
            tracing::debug!("Status channel receiver dropped, unbinding");
            guard.take();
        }
    }
}

impl fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBus")
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ============================================================================
// Status Stream
// ============================================================================

/// Receiving end of a bound status channel.
pub struct StatusStream {
    receiver: mpsc::UnboundedReceiver<StatusMessage>,
}

impl StatusStream {
    /// Receives the next message. Returns `None` once the stream has been
    /// replaced or unregistered and all buffered messages were consumed.
    pub async fn recv(&mut self) -> Option<StatusMessage> {
        self.receiver.recv().await
    }

    /// Attempts to receive a message without waiting.
    pub fn try_recv(&mut self) -> Option<StatusMessage> {
        self.receiver.try_recv().ok()
    }

    /// Collects every message currently buffered.
    pub fn drain(&mut self) -> Vec<StatusMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl fmt::Debug for StatusStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStream").finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
