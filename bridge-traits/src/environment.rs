//! Host environment hooks and out-of-band signals.
//!
//! The platform owns audio-focus arbitration, telephony state and the
//! hardware volume keys. The core only reacts to the signals defined here and
//! calls back into the host through [`HostEnvironment`].

use crate::error::Result;
use serde_json::Value;

/// Audio focus transitions reported by the platform arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    Loss,
    LossTransient,
    LossTransientCanDuck,
}

impl FocusChange {
    /// Map Android `AUDIOFOCUS_*` constants. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(FocusChange::Gain),
            -1 => Some(FocusChange::Loss),
            -2 => Some(FocusChange::LossTransient),
            -3 => Some(FocusChange::LossTransientCanDuck),
            _ => None,
        }
    }

    pub fn is_loss(self) -> bool {
        !matches!(self, FocusChange::Gain)
    }
}

/// Call state broadcast by the telephony service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelephonyState {
    Ringing,
    OffHook,
    Idle,
}

impl TelephonyState {
    /// Parse the broadcast payload (`"ringing"`, `"offhook"`, `"idle"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ringing" => Some(TelephonyState::Ringing),
            "offhook" => Some(TelephonyState::OffHook),
            "idle" => Some(TelephonyState::Idle),
            _ => None,
        }
    }

    /// Whether playback must yield to the call.
    pub fn interrupts_playback(self) -> bool {
        matches!(self, TelephonyState::Ringing | TelephonyState::OffHook)
    }
}

/// Side effects the host performs on behalf of the session registry.
pub trait HostEnvironment: Send + Sync {
    /// The registry went from zero to one session. Hosts typically route the
    /// hardware volume keys to the music stream here.
    fn on_first_session_created(&self);

    /// The registry became empty again; undo [`on_first_session_created`].
    ///
    /// [`on_first_session_created`]: HostEnvironment::on_first_session_created
    fn on_last_session_released(&self);

    /// Ask the platform arbiter for exclusive audio focus.
    fn request_audio_focus(&self) -> Result<()>;
}

/// Environment for hosts without focus or volume-key integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnvironment;

impl HostEnvironment for NoopEnvironment {
    fn on_first_session_created(&self) {}

    fn on_last_session_released(&self) {}

    fn request_audio_focus(&self) -> Result<()> {
        Ok(())
    }
}

/// Long-lived message channel back into the scripting environment.
///
/// One payload per call; the channel stays open after each delivery.
pub trait StatusChannel: Send + Sync {
    fn send(&self, payload: Value) -> Result<()>;
}
