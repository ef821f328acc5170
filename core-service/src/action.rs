//! # Host Actions
//!
//! Named actions arriving from the scripting bridge, each with a positional
//! JSON argument array whose first element is the session id.
//!
//! | Action                     | Arguments               |
//! |----------------------------|-------------------------|
//! | `create`                   | `[id, src]`             |
//! | `startPlayingAudio`        | `[id, src, options?]`   |
//! | `pausePlayingAudio`        | `[id]`                  |
//! | `stopPlayingAudio`         | `[id]`                  |
//! | `seekToAudio`              | `[id, milliseconds]`    |
//! | `setVolume`                | `[id, "level"]`         |
//! | `getCurrentPositionAudio`  | `[id]`                  |
//! | `getDurationAudio`         | `[id, src]`             |
//! | `release`                  | `[id]`                  |
//! | `messageChannel`           | `[]`                    |

use crate::error::{Result, ServiceError};
use core_playback::session::DEFAULT_VOLUME;
use serde_json::Value;
use tracing::debug;

pub const CREATE: &str = "create";
pub const START_PLAYING: &str = "startPlayingAudio";
pub const PAUSE_PLAYING: &str = "pausePlayingAudio";
pub const STOP_PLAYING: &str = "stopPlayingAudio";
pub const SEEK_TO: &str = "seekToAudio";
pub const SET_VOLUME: &str = "setVolume";
pub const GET_CURRENT_POSITION: &str = "getCurrentPositionAudio";
pub const GET_DURATION: &str = "getDurationAudio";
pub const RELEASE: &str = "release";
pub const MESSAGE_CHANNEL: &str = "messageChannel";

/// A parsed host action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create { id: String, location: Option<String> },
    Play { id: String, location: Option<String> },
    Pause { id: String },
    Stop { id: String },
    Seek { id: String, position_ms: u64 },
    SetVolume { id: String, level: f32 },
    Position { id: String },
    Duration { id: String, location: Option<String> },
    Release { id: String },
    MessageChannel,
}

impl Action {
    /// Parse `name` and its positional `args`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownAction`] for names outside the table above and
    /// [`ServiceError::InvalidArguments`] when the session id is missing.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        let action = match name {
            CREATE => Action::Create {
                id: session_id(CREATE, args)?,
                location: location(args),
            },
            START_PLAYING => Action::Play {
                id: session_id(START_PLAYING, args)?,
                location: location(args),
            },
            PAUSE_PLAYING => Action::Pause {
                id: session_id(PAUSE_PLAYING, args)?,
            },
            STOP_PLAYING => Action::Stop {
                id: session_id(STOP_PLAYING, args)?,
            },
            SEEK_TO => Action::Seek {
                id: session_id(SEEK_TO, args)?,
                position_ms: milliseconds(SEEK_TO, args.get(1))?,
            },
            SET_VOLUME => Action::SetVolume {
                id: session_id(SET_VOLUME, args)?,
                level: volume(args.get(1)),
            },
            GET_CURRENT_POSITION => Action::Position {
                id: session_id(GET_CURRENT_POSITION, args)?,
            },
            GET_DURATION => Action::Duration {
                id: session_id(GET_DURATION, args)?,
                location: location(args),
            },
            RELEASE => Action::Release {
                id: session_id(RELEASE, args)?,
            },
            MESSAGE_CHANNEL => Action::MessageChannel,
            other => return Err(ServiceError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => CREATE,
            Action::Play { .. } => START_PLAYING,
            Action::Pause { .. } => PAUSE_PLAYING,
            Action::Stop { .. } => STOP_PLAYING,
            Action::Seek { .. } => SEEK_TO,
            Action::SetVolume { .. } => SET_VOLUME,
            Action::Position { .. } => GET_CURRENT_POSITION,
            Action::Duration { .. } => GET_DURATION,
            Action::Release { .. } => RELEASE,
            Action::MessageChannel => MESSAGE_CHANNEL,
        }
    }
}

fn session_id(action: &'static str, args: &Value) -> Result<String> {
    match args.get(0) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ServiceError::InvalidArguments {
            action,
            message: "expected a session id as the first argument".to_string(),
        }),
    }
}

/// Media location in the second slot; absent, null and blank mean "keep the
/// session's current source".
fn location(args: &Value) -> Option<String> {
    args.get(1)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn milliseconds(action: &'static str, value: Option<&Value>) -> Result<u64> {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        Some(ms) if ms.is_finite() => Ok(ms.max(0.0) as u64),
        _ => Err(ServiceError::InvalidArguments {
            action,
            message: format!("expected a position in milliseconds, got {:?}", value),
        }),
    }
}

/// The bridge sends the level as a string. Anything unparsable means full
/// volume.
fn volume(value: Option<&Value>) -> f32 {
    let parsed = match value {
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        Some(Value::Number(n)) => n.as_f64().map(|v| v as f32),
        _ => None,
    };

    match parsed {
        Some(level) if level.is_finite() => level.clamp(0.0, 1.0),
        _ => {
            debug!(?value, "Unparsable volume, using default");
            DEFAULT_VOLUME
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_play_with_location() {
        let action = Action::parse(START_PLAYING, &json!(["a", "/sdcard/a.mp3", {}])).unwrap();
        assert_eq!(
            action,
            Action::Play {
                id: "a".to_string(),
                location: Some("/sdcard/a.mp3".to_string()),
            }
        );
        assert_eq!(action.name(), START_PLAYING);
    }

    #[test]
    fn blank_location_keeps_current_source() {
        let action = Action::parse(START_PLAYING, &json!(["a", ""])).unwrap();
        assert_eq!(
            action,
            Action::Play {
                id: "a".to_string(),
                location: None
            }
        );

        let action = Action::parse(GET_DURATION, &json!(["a", null])).unwrap();
        assert_eq!(
            action,
            Action::Duration {
                id: "a".to_string(),
                location: None
            }
        );
    }

    #[test]
    fn seek_accepts_numbers_and_strings() {
        let seek = |v: Value| match Action::parse(SEEK_TO, &json!(["a", v])).unwrap() {
            Action::Seek { position_ms, .. } => position_ms,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(seek(json!(5000)), 5000);
        assert_eq!(seek(json!(1234.9)), 1234);
        assert_eq!(seek(json!("250")), 250);
        assert_eq!(seek(json!(-10)), 0);

        assert!(matches!(
            Action::parse(SEEK_TO, &json!(["a", "soon"])),
            Err(ServiceError::InvalidArguments { action: SEEK_TO, .. })
        ));
    }

    #[test]
    fn volume_falls_back_to_full() {
        let level = |v: Value| match Action::parse(SET_VOLUME, &json!(["a", v])).unwrap() {
            Action::SetVolume { level, .. } => level,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(level(json!("0.5")), 0.5);
        assert_eq!(level(json!(0.25)), 0.25);
        assert_eq!(level(json!("loud")), 1.0);
        assert_eq!(level(json!(null)), 1.0);
        assert_eq!(level(json!("7")), 1.0);
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(matches!(
            Action::parse(PAUSE_PLAYING, &json!([])),
            Err(ServiceError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Action::parse(RELEASE, &json!([""])),
            Err(ServiceError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn unknown_action() {
        let err = Action::parse("startRecordingAudio", &json!(["a"])).unwrap_err();
        assert!(matches!(err, ServiceError::UnknownAction(name) if name == "startRecordingAudio"));
    }

    #[test]
    fn message_channel_takes_no_arguments() {
        assert_eq!(
            Action::parse(MESSAGE_CHANNEL, &Value::Null).unwrap(),
            Action::MessageChannel
        );
    }
}
