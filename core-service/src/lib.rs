//! Media service façade for the scripting bridge.
//!
//! [`MediaService`] is what a host plugin talks to. It turns named actions
//! with JSON arguments into registry calls, forwards every status event to
//! the bound [`StatusChannel`] wrapped in a `{"action":"status"}` envelope,
//! and receives the out-of-band focus and telephony signals.
//!
//! Commands are fire-and-forget: their outcome is only ever reported through
//! the status channel. Queries answer with a plain JSON number and fall back
//! to `0` for unknown sessions.
//!
//! ```ignore
//! use core_runtime::config::MediaConfig;
//! use core_service::MediaService;
//! use serde_json::json;
//!
//! let config = MediaConfig::builder()
//!     .resource_factory(factory)
//!     .environment(environment)
//!     .build()?;
//! let service = MediaService::new(config)?;
//!
//! service.execute("messageChannel", &json!([]), Some(channel)).await?;
//! service.execute("startPlayingAudio", &json!(["intro", "/android_asset/www/intro.mp3"]), None).await?;
//! ```

pub mod action;
pub mod error;

pub use action::Action;
pub use error::{Result, ServiceError};

use bridge_traits::{FocusChange, StatusChannel, TelephonyState};
use core_playback::{PlaybackError, SessionRegistry};
use core_runtime::config::MediaConfig;
use core_runtime::events::{EventSink, StatusBus, StatusEvent, StatusMessage, StatusStream};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

/// Out-of-band message id carrying the telephony state.
pub const TELEPHONE_MESSAGE: &str = "telephone";

/// Wrap a status message in the envelope the scripting side listens for.
pub fn status_envelope(message: &StatusMessage) -> Value {
    json!({
        "action": "status",
        "status": message,
    })
}

pub struct MediaService {
    registry: SessionRegistry,
    bus: Arc<StatusBus>,
    runtime: Handle,
}

impl MediaService {
    /// Build the service and its registry.
    ///
    /// # Errors
    ///
    /// Fails when `config` is invalid or when called outside a tokio runtime.
    pub fn new(config: MediaConfig) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(StatusBus::new());
        let registry = SessionRegistry::new(config, bus.clone())?;
        let runtime = Handle::try_current().map_err(|_| core_runtime::Error::CapabilityMissing {
            capability: "tokio runtime".to_string(),
            message: "MediaService must be created from within a tokio runtime.".to_string(),
        })?;

        info!("Media service ready");
        Ok(Self {
            registry,
            bus,
            runtime,
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run the host action `action` with positional `args`.
    ///
    /// `channel` is the host callback for this call. It is only kept by
    /// `messageChannel`, which binds it as the status channel.
    #[instrument(skip(self, args, channel), fields(action = %action))]
    pub async fn execute(
        &self,
        action: &str,
        args: &Value,
        channel: Option<Arc<dyn StatusChannel>>,
    ) -> Result<Value> {
        let action = Action::parse(action, args)?;

        if let Action::MessageChannel = action {
            let channel = channel.ok_or_else(|| ServiceError::InvalidArguments {
                action: crate::action::MESSAGE_CHANNEL,
                message: "a status channel is required".to_string(),
            })?;
            self.register_status_channel(channel);
            return Ok(Value::Null);
        }

        self.dispatch(action).await
    }

    /// Run an already parsed action. `messageChannel` is handled by
    /// [`execute`](Self::execute) and rejected here.
    pub async fn dispatch(&self, action: Action) -> Result<Value> {
        debug!(action = action.name(), "Dispatching");

        match action {
            Action::Create { id, location } => {
                if let Err(error) = self.registry.get_or_create(&id, location.as_deref()) {
                    self.report_rejected(&id, error);
                }
                Ok(Value::Null)
            }
            Action::Play { id, location } => {
                if let Err(error) = self.registry.play(&id, location.as_deref()) {
                    self.report_rejected(&id, error);
                }
                Ok(Value::Null)
            }
            Action::Pause { id } => {
                let result = self.registry.pause(&id);
                self.fire_and_forget(&id, result)
            }
            Action::Stop { id } => {
                let result = self.registry.stop(&id);
                self.fire_and_forget(&id, result)
            }
            Action::Seek { id, position_ms } => {
                let result = self.registry.seek(&id, position_ms);
                self.fire_and_forget(&id, result)
            }
            Action::SetVolume { id, level } => {
                let result = self.registry.set_volume(&id, level);
                self.fire_and_forget(&id, result)
            }
            Action::Position { id } => {
                let seconds = self.registry.get_current_position(&id).await;
                Ok(json!(seconds))
            }
            Action::Duration { id, location } => {
                match self.registry.get_duration(&id, location.as_deref()).await {
                    Ok(seconds) => Ok(json!(seconds)),
                    Err(error) => {
                        self.report_rejected(&id, error);
                        Ok(json!(0.0))
                    }
                }
            }
            Action::Release { id } => Ok(Value::Bool(self.registry.release(&id).await)),
            Action::MessageChannel => Err(ServiceError::InvalidArguments {
                action: crate::action::MESSAGE_CHANNEL,
                message: "use execute or register_status_channel".to_string(),
            }),
        }
    }

    /// Bind `channel` as the single status listener, replacing the previous
    /// one. Every status message is forwarded in order until the channel is
    /// replaced or the service shuts down.
    pub fn register_status_channel(&self, channel: Arc<dyn StatusChannel>) {
        let stream = self.bus.register_channel();
        self.runtime.spawn(forward_status(stream, channel));
        info!("Status channel bound");
    }

    /// Out-of-band message from the host. Only `telephone` is understood.
    pub async fn on_message(&self, id: &str, data: &Value) {
        if id != TELEPHONE_MESSAGE {
            debug!(id, "Ignoring host message");
            return;
        }

        match data.as_str().and_then(TelephonyState::parse) {
            Some(state) => self.registry.on_telephony_state(state).await,
            None => debug!(?data, "Unknown telephony state"),
        }
    }

    /// Audio focus changed; `code` is the platform focus code.
    pub async fn on_focus_change(&self, code: i32) {
        match FocusChange::from_code(code) {
            Some(change) => self.registry.on_focus_change(change).await,
            None => debug!(code, "Ignoring unknown focus code"),
        }
    }

    /// The host page was reloaded: every session goes away.
    pub async fn on_reset(&self) {
        self.registry.release_all().await;
    }

    /// The host plugin is being destroyed.
    pub async fn on_destroy(&self) {
        self.registry.release_all().await;
        self.bus.unregister();
        info!("Media service shut down");
    }

    fn fire_and_forget(&self, id: &str, result: core_playback::Result<()>) -> Result<Value> {
        match result {
            Ok(()) => Ok(Value::Null),
            Err(PlaybackError::InvalidSession(_)) => {
                debug!(session = id, "Command for unknown session ignored");
                Ok(Value::Null)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Report a command the registry refused before any session could see
    /// it. A bad location surfaces as an ERROR status like any load failure.
    fn report_rejected(&self, id: &str, error: PlaybackError) {
        warn!(session = id, %error, "Command rejected");
        if let PlaybackError::InvalidSource(_) = error {
            self.bus.emit(StatusMessage::new(
                id,
                StatusEvent::Error {
                    code: error.status_code(),
                },
            ));
        }
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("registry", &self.registry)
            .field("bus", &self.bus)
            .finish()
    }
}

async fn forward_status(mut stream: StatusStream, channel: Arc<dyn StatusChannel>) {
    while let Some(message) = stream.recv().await {
        if let Err(error) = channel.send(status_envelope(&message)) {
            warn!(session = %message.session_id, %error, "Failed to deliver status");
        }
    }
    debug!("Status channel unbound");
}
