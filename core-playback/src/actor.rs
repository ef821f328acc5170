//! # Session Actor
//!
//! Serializes every entry point of one session.
//!
//! Caller commands, resource callbacks and prepare deadlines are all turned
//! into [`SessionMessage`]s and consumed in FIFO order by a single tokio task
//! that owns the [`SessionStateMachine`]. Resource notifications therefore
//! never re-enter the state machine from the platform's worker thread.
//!
//! After each message the actor publishes a [`SessionSnapshot`] so cheap
//! reads (state, cached volume) never wait on the queue.

use crate::error::{PlaybackError, Result};
use crate::session::{CallbackRouter, SessionSnapshot, SessionStateMachine};
use bridge_traits::{
    MediaResourceFactory, MediaSource, PlaybackState, ResourceEvent, ResourceListener,
};
use core_runtime::events::EventSink;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, Instrument};

/// Commands a caller can send to a session.
pub(crate) enum SessionCommand {
    Play {
        source: Option<MediaSource>,
    },
    Pause,
    Stop,
    Seek {
        position_ms: u64,
    },
    SetVolume {
        level: f32,
    },
    PauseIfRunning {
        reply: oneshot::Sender<bool>,
    },
    Position {
        reply: oneshot::Sender<u64>,
    },
    Duration {
        source: Option<MediaSource>,
        reply: oneshot::Sender<f64>,
    },
    State {
        reply: oneshot::Sender<PlaybackState>,
    },
    Destroy {
        reply: oneshot::Sender<bool>,
    },
}

pub(crate) enum SessionMessage {
    Command(SessionCommand),
    Resource { generation: u64, event: ResourceEvent },
    PrepareDeadline { generation: u64 },
}

/// Shared collaborators every session is built with.
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub factory: Arc<dyn MediaResourceFactory>,
    pub sink: Arc<dyn EventSink>,
    pub prepare_timeout: Option<Duration>,
}

// ============================================================================
// Callback routing
// ============================================================================

struct GenerationListener {
    generation: u64,
    tx: mpsc::WeakUnboundedSender<SessionMessage>,
}

impl ResourceListener for GenerationListener {
    fn on_event(&self, event: ResourceEvent) {
        let Some(tx) = self.tx.upgrade() else {
            debug!(generation = self.generation, ?event, "Session gone, dropping resource event");
            return;
        };

        let message = SessionMessage::Resource {
            generation: self.generation,
            event,
        };
        if tx.send(message).is_err() {
            debug!(generation = self.generation, "Session actor stopped, dropping resource event");
        }
    }
}

struct ActorRouter {
    tx: mpsc::WeakUnboundedSender<SessionMessage>,
}

impl CallbackRouter for ActorRouter {
    fn listener(&self, generation: u64) -> Arc<dyn ResourceListener> {
        Arc::new(GenerationListener {
            generation,
            tx: self.tx.clone(),
        })
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable address of a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    tx: mpsc::UnboundedSender<SessionMessage>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last state published by the actor.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.read()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot.read().state
    }

    /// Whether the actor has shut down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(SessionMessage::Command(command))
            .map_err(|_| PlaybackError::SessionClosed(self.id.to_string()))
    }

    pub(crate) async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response
            .await
            .map_err(|_| PlaybackError::SessionClosed(self.id.to_string()))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Start the actor for session `id` on `runtime`.
pub(crate) fn spawn_session(
    id: &str,
    source: Option<MediaSource>,
    deps: &SessionDeps,
    runtime: &Handle,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Arc::new(ActorRouter { tx: tx.downgrade() });
    let machine = SessionStateMachine::new(
        id,
        source,
        Arc::clone(&deps.factory),
        Arc::clone(&deps.sink),
        router,
    );
    let snapshot = Arc::new(RwLock::new(machine.snapshot()));

    let actor = SessionActor {
        machine,
        rx,
        tx: tx.downgrade(),
        snapshot: Arc::clone(&snapshot),
        prepare_timeout: deps.prepare_timeout,
        armed_deadline: None,
    };
    runtime.spawn(actor.run().instrument(tracing::debug_span!("session", session = %id)));

    SessionHandle {
        id: Arc::from(id),
        tx,
        snapshot,
    }
}

struct SessionActor {
    machine: SessionStateMachine,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    tx: mpsc::WeakUnboundedSender<SessionMessage>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    prepare_timeout: Option<Duration>,
    armed_deadline: Option<u64>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!("Session actor started");

        while let Some(message) = self.rx.recv().await {
            self.handle(message);
            self.publish();

            if self.machine.is_destroyed() {
                break;
            }
            self.arm_prepare_deadline();
        }

        debug!("Session actor stopped");
    }

    fn handle(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Command(command) => self.handle_command(command),
            SessionMessage::Resource { generation, event } => {
                if let Err(error) = self.machine.on_resource_event(generation, event) {
                    debug!(%error, ?event, "Ignoring resource callback");
                }
            }
            SessionMessage::PrepareDeadline { generation } => {
                if let Some(timeout) = self.prepare_timeout {
                    if self.machine.on_prepare_deadline(generation, timeout) {
                        debug!(generation, "Prepare deadline expired");
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Play { source } => self.machine.request_play(source),
            SessionCommand::Pause => self.machine.request_pause(),
            SessionCommand::Stop => self.machine.request_stop(),
            SessionCommand::Seek { position_ms } => self.machine.request_seek(position_ms),
            SessionCommand::SetVolume { level } => self.machine.request_set_volume(level),
            SessionCommand::PauseIfRunning { reply } => {
                let paused = self.machine.pause_if_running();
                self.reply(reply, paused);
            }
            SessionCommand::Position { reply } => {
                let position = self.machine.query_position();
                self.reply(reply, position);
            }
            SessionCommand::Duration { source, reply } => {
                let duration = self.machine.query_duration(source);
                self.reply(reply, duration);
            }
            SessionCommand::State { reply } => {
                let state = self.machine.state();
                self.reply(reply, state);
            }
            SessionCommand::Destroy { reply } => {
                let destroyed = self.machine.destroy();
                self.reply(reply, destroyed);
            }
        }
    }

    /// Publish the snapshot first so a caller woken by the reply observes it.
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        reply.send(value).ok();
    }

    fn publish(&self) {
        *self.snapshot.write() = self.machine.snapshot();
    }

    /// Schedule a deadline for a newly started prepare.
    fn arm_prepare_deadline(&mut self) {
        let Some(timeout) = self.prepare_timeout else {
            return;
        };
        let Some(generation) = self.machine.pending_prepare() else {
            return;
        };
        if self.armed_deadline == Some(generation) {
            return;
        }
        self.armed_deadline = Some(generation);

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tx) = tx.upgrade() {
                tx.send(SessionMessage::PrepareDeadline { generation }).ok();
            }
        });
    }
}
