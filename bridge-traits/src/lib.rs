//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the media session core and the
//! platform it runs on. Each trait represents a capability the core requires
//! but that must be implemented differently per platform (Android, iOS,
//! desktop).
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaResourceFactory`](playback::MediaResourceFactory) - Allocates native decode/output handles
//! - [`MediaResource`](playback::MediaResource) - Transport contract for one handle
//! - [`ResourceListener`](playback::ResourceListener) - Receives prepared/completed/error notifications
//!
//! ### Platform Integration
//! - [`HostEnvironment`](environment::HostEnvironment) - Volume-key routing and audio focus requests
//! - [`StatusChannel`](environment::StatusChannel) - Long-lived message channel to the scripting side
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let factory = builder.resource_factory
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "MediaResourceFactory".to_string(),
//!         message: "Inject the platform media player adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should report native error codes through
//! [`BridgeError::Native`](error::BridgeError::Native) so they can be forwarded
//! to the scripting side unchanged.
//!
//! ## Thread Safety
//!
//! Factories, listeners and environment hooks are `Send + Sync`. A
//! [`MediaResource`](playback::MediaResource) is only `Send`: the core guarantees
//! that a single task drives each handle.

pub mod environment;
pub mod error;
pub mod logging;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use environment::{FocusChange, HostEnvironment, NoopEnvironment, StatusChannel, TelephonyState};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    MediaResource, MediaResourceFactory, MediaSource, PlaybackState, PrepareMode,
    PrepareOutcome, ResourceEvent, ResourceListener,
};
