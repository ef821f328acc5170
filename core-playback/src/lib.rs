//! # Playback Session Core
//!
//! Manages concurrently addressable playback sessions, each backed by one
//! native decode/output resource supplied by the host.
//!
//! ## Overview
//!
//! This crate handles:
//! - The per-session lifecycle state machine, including commands deferred
//!   until the resource is prepared
//! - One actor task per session that serializes commands and resource callbacks
//! - The session registry: creation, lookup, release and focus/telephony
//!   interruptions
//! - Parsing of media locations into [`MediaSource`](bridge_traits::MediaSource)s
//!
//! Status changes leave the crate exclusively through the
//! [`EventSink`](core_runtime::events::EventSink) injected at construction.
//! Commands never report their outcome synchronously.

pub mod actor;
pub mod error;
pub mod intent;
pub mod registry;
pub mod session;
pub mod source;

pub use actor::SessionHandle;
pub use error::{PlaybackError, Result};
pub use intent::DeferredIntent;
pub use registry::{InterruptionReason, SessionRegistry};
pub use session::{SessionSnapshot, SessionStateMachine};
pub use source::SourceResolver;
