//! # Playback Error Types
//!
//! Error types for session and resource operations, plus the mapping onto the
//! status-channel error codes the scripting side understands.

use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Status-channel error codes.
pub mod codes {
    pub const MEDIA_ERR_NONE_ACTIVE: i32 = 0;
    pub const MEDIA_ERR_ABORTED: i32 = 1;
    pub const MEDIA_ERR_NETWORK: i32 = 2;
    pub const MEDIA_ERR_DECODE: i32 = 3;
    pub const MEDIA_ERR_NONE_SUPPORTED: i32 = 4;
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// No session with this id exists.
    #[error("Unknown session: {0}")]
    InvalidSession(String),

    /// The location could not be turned into a media source.
    #[error("Invalid media source: {0}")]
    InvalidSource(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The factory could not allocate a native resource.
    #[error("Failed to create media resource: {0}")]
    ResourceCreationFailed(#[source] BridgeError),

    /// The resource rejected the source or failed to prepare it.
    #[error("Failed to load {location}: {error}")]
    SourceLoadFailed {
        location: String,
        #[source]
        error: BridgeError,
    },

    /// A transport call on a ready resource failed.
    #[error("Resource operation '{operation}' failed: {error}")]
    ResourceOperation {
        operation: &'static str,
        #[source]
        error: BridgeError,
    },

    /// The resource reported an asynchronous error.
    #[error("Native media fault (what={what}, extra={extra})")]
    NativeFault { what: i32, extra: i32 },

    /// The prepared notification did not arrive in time.
    #[error("Prepare timed out after {0:?}")]
    PrepareTimedOut(Duration),

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A callback arrived for a resource that is no longer current.
    #[error("Unexpected callback for resource generation {0}")]
    UnexpectedCallback(u64),

    /// The session actor has shut down.
    #[error("Session closed: {0}")]
    SessionClosed(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Status-channel code reported in the ERROR event for this fault.
    pub fn status_code(&self) -> i32 {
        match self {
            PlaybackError::NativeFault { what, .. } => *what,
            PlaybackError::ResourceCreationFailed(_) | PlaybackError::SourceLoadFailed { .. } => {
                codes::MEDIA_ERR_ABORTED
            }
            PlaybackError::ResourceOperation { error, .. } => {
                error.native_code().unwrap_or(codes::MEDIA_ERR_ABORTED)
            }
            PlaybackError::PrepareTimedOut(_) => codes::MEDIA_ERR_NETWORK,
            PlaybackError::InvalidSource(_) => codes::MEDIA_ERR_NONE_SUPPORTED,
            PlaybackError::InvalidSession(_)
            | PlaybackError::UnexpectedCallback(_)
            | PlaybackError::SessionClosed(_)
            | PlaybackError::Runtime(_)
            | PlaybackError::Internal(_) => codes::MEDIA_ERR_NONE_ACTIVE,
        }
    }

    /// Returns `true` if this error describes a resource fault that moves the
    /// session into the error state.
    pub fn is_resource_fault(&self) -> bool {
        matches!(
            self,
            PlaybackError::ResourceCreationFailed(_)
                | PlaybackError::SourceLoadFailed { .. }
                | PlaybackError::ResourceOperation { .. }
                | PlaybackError::NativeFault { .. }
                | PlaybackError::PrepareTimedOut(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_fault_forwards_what() {
        let err = PlaybackError::NativeFault {
            what: 100,
            extra: -1004,
        };
        assert_eq!(err.status_code(), 100);
        assert!(err.is_resource_fault());
    }

    #[test]
    fn load_failures_are_aborted() {
        let err = PlaybackError::SourceLoadFailed {
            location: "a.mp3".to_string(),
            error: BridgeError::OperationFailed("setDataSource".to_string()),
        };
        assert_eq!(err.status_code(), codes::MEDIA_ERR_ABORTED);

        let err = PlaybackError::ResourceCreationFailed(BridgeError::NotAvailable(
            "player".to_string(),
        ));
        assert_eq!(err.status_code(), codes::MEDIA_ERR_ABORTED);
    }

    #[test]
    fn operation_failure_prefers_native_code() {
        let err = PlaybackError::ResourceOperation {
            operation: "start",
            error: BridgeError::Native {
                code: codes::MEDIA_ERR_DECODE,
                message: "bad frame".to_string(),
            },
        };
        assert_eq!(err.status_code(), codes::MEDIA_ERR_DECODE);
    }

    #[test]
    fn timeout_is_network() {
        let err = PlaybackError::PrepareTimedOut(Duration::from_secs(5));
        assert_eq!(err.status_code(), codes::MEDIA_ERR_NETWORK);
    }

    #[test]
    fn protocol_errors_are_not_faults() {
        assert!(!PlaybackError::UnexpectedCallback(3).is_resource_fault());
        assert!(!PlaybackError::InvalidSession("x".to_string()).is_resource_fault());
    }
}
