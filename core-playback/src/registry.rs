//! # Session Registry
//!
//! Maps caller-chosen session ids to running session actors.
//!
//! ## Overview
//!
//! The registry creates a session on first reference, destroys it on explicit
//! release and coordinates bulk interruptions. It keeps three memberships
//! behind one lock:
//!
//! - every live session
//! - sessions paused because of a phone call
//! - sessions paused because another application took audio focus
//!
//! The two pause sets are independent and idempotent: a session id is either
//! a member or not, so a resume never targets the same session twice.
//!
//! ## Locking
//!
//! The registry lock only guards lookups, inserts and removals. It is never
//! held while waiting on a session actor or while calling the first/last
//! session environment hooks, so neither can deadlock against the registry.
//!
//! ## Example
//!
//! ```ignore
//! use core_playback::SessionRegistry;
//! use core_runtime::events::StatusBus;
//! use std::sync::Arc;
//!
//! let bus = Arc::new(StatusBus::new());
//! let registry = SessionRegistry::new(config, bus.clone())?;
//!
//! registry.play("intro", Some("/android_asset/www/intro.mp3"))?;
//! let seconds = registry.get_current_position("intro").await;
//! registry.release("intro").await;
//! ```

use crate::actor::{spawn_session, SessionCommand, SessionDeps, SessionHandle};
use crate::error::{PlaybackError, Result};
use crate::source::SourceResolver;
use bridge_traits::{FocusChange, HostEnvironment, MediaSource, PlaybackState, TelephonyState};
use core_runtime::config::{FeatureFlags, MediaConfig};
use core_runtime::events::EventSink;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Why a batch of sessions was paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptionReason {
    Telephony,
    Focus,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, SessionHandle>,
    paused_for_telephony: HashSet<String>,
    paused_for_focus: HashSet<String>,
}

impl RegistryInner {
    fn paused(&mut self, reason: InterruptionReason) -> &mut HashSet<String> {
        match reason {
            InterruptionReason::Telephony => &mut self.paused_for_telephony,
            InterruptionReason::Focus => &mut self.paused_for_focus,
        }
    }
}

pub struct SessionRegistry {
    deps: SessionDeps,
    environment: Arc<dyn HostEnvironment>,
    features: FeatureFlags,
    resolver: SourceResolver,
    runtime: Handle,
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    /// Create a registry whose sessions report through `sink`.
    ///
    /// # Errors
    ///
    /// Fails with a missing-capability error when called outside a tokio
    /// runtime; session actors are spawned on the runtime captured here.
    pub fn new(config: MediaConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| core_runtime::Error::CapabilityMissing {
            capability: "tokio runtime".to_string(),
            message: "SessionRegistry must be created from within a tokio runtime.".to_string(),
        })?;

        Ok(Self {
            resolver: SourceResolver::from_config(&config),
            deps: SessionDeps {
                factory: config.resource_factory,
                sink,
                prepare_timeout: config.prepare_timeout,
            },
            environment: config.environment,
            features: config.features,
            runtime,
            inner: Mutex::new(RegistryInner::default()),
        })
    }

    fn resolve(&self, location: Option<&str>) -> Result<Option<MediaSource>> {
        location.map(|l| self.resolver.resolve(l)).transpose()
    }

    fn get_or_spawn(&self, id: &str, source: Option<MediaSource>) -> SessionHandle {
        let (handle, first) = {
            let mut inner = self.inner.lock();
            if let Some(handle) = inner.sessions.get(id) {
                return handle.clone();
            }

            let first = inner.sessions.is_empty();
            let handle = spawn_session(id, source, &self.deps, &self.runtime);
            inner.sessions.insert(id.to_string(), handle.clone());
            (handle, first)
        };

        // Hooks run unlocked so they may call back into the registry.
        if first {
            self.environment.on_first_session_created();
        }

        info!(session = id, "Session created");
        handle
    }

    fn lookup(&self, id: &str) -> Result<SessionHandle> {
        self.get(id)
            .ok_or_else(|| PlaybackError::InvalidSession(id.to_string()))
    }

    /// Return the session for `id`, creating it with `location` if needed.
    /// An existing session keeps its source.
    pub fn get_or_create(&self, id: &str, location: Option<&str>) -> Result<SessionHandle> {
        let source = self.resolve(location)?;
        Ok(self.get_or_spawn(id, source))
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.inner.lock().sessions.get(id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Ids paused for `reason` and not yet resumed.
    pub fn paused_for(&self, reason: InterruptionReason) -> HashSet<String> {
        self.inner.lock().paused(reason).clone()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Play `id`, creating the session if needed, then ask the host for audio
    /// focus.
    pub fn play(&self, id: &str, location: Option<&str>) -> Result<()> {
        let source = self.resolve(location)?;
        let handle = self.get_or_spawn(id, source.clone());
        handle.send(SessionCommand::Play { source })?;

        if self.features.request_focus_on_play {
            if let Err(error) = self.environment.request_audio_focus() {
                warn!(session = id, %error, "Audio focus request failed");
            }
        }
        Ok(())
    }

    pub fn pause(&self, id: &str) -> Result<()> {
        self.lookup(id)?.send(SessionCommand::Pause)
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        self.lookup(id)?.send(SessionCommand::Stop)
    }

    pub fn seek(&self, id: &str, position_ms: u64) -> Result<()> {
        self.lookup(id)?.send(SessionCommand::Seek { position_ms })
    }

    pub fn set_volume(&self, id: &str, level: f32) -> Result<()> {
        self.lookup(id)?.send(SessionCommand::SetVolume { level })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Position in seconds; `0.0` for unknown sessions.
    pub async fn get_current_position(&self, id: &str) -> f64 {
        let Some(handle) = self.get(id) else {
            debug!(session = id, "Position query for unknown session");
            return 0.0;
        };

        match handle
            .request(|reply| SessionCommand::Position { reply })
            .await
        {
            Ok(position_ms) => position_ms as f64 / 1000.0,
            Err(error) => {
                debug!(session = id, %error, "Position query failed");
                0.0
            }
        }
    }

    /// Duration in seconds, creating and loading the session if needed.
    pub async fn get_duration(&self, id: &str, location: Option<&str>) -> Result<f64> {
        let source = self.resolve(location)?;
        let handle = self.get_or_spawn(id, source.clone());
        handle
            .request(|reply| SessionCommand::Duration { source, reply })
            .await
    }

    /// State as seen by the session actor, after every earlier message to
    /// that session has been handled.
    pub async fn state(&self, id: &str) -> Option<PlaybackState> {
        let handle = self.get(id)?;
        handle
            .request(|reply| SessionCommand::State { reply })
            .await
            .ok()
    }

    /// Apply `f` to every session whose last published state is running.
    ///
    /// This reads snapshots, so a session may have changed state by the time
    /// `f` sees it. Interruption sweeps use [`pause_all_for`](Self::pause_all_for)
    /// instead, which checks and pauses inside each session actor.
    pub fn for_each_running<F>(&self, mut f: F)
    where
        F: FnMut(&SessionHandle),
    {
        let running: Vec<SessionHandle> = self
            .inner
            .lock()
            .sessions
            .values()
            .filter(|handle| handle.state() == PlaybackState::Running)
            .cloned()
            .collect();

        for handle in &running {
            f(handle);
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Destroy session `id`. Returns whether it existed.
    pub async fn release(&self, id: &str) -> bool {
        let (handle, last) = {
            let mut inner = self.inner.lock();
            let Some(handle) = inner.sessions.remove(id) else {
                return false;
            };
            inner.paused_for_telephony.remove(id);
            inner.paused_for_focus.remove(id);
            (handle, inner.sessions.is_empty())
        };

        if last {
            self.environment.on_last_session_released();
        }

        destroy_session(handle).await;
        info!(session = id, "Session released");
        true
    }

    /// Destroy every session (process teardown or page reset).
    pub async fn release_all(&self) {
        let handles: Vec<SessionHandle> = {
            let mut inner = self.inner.lock();
            inner.paused_for_telephony.clear();
            inner.paused_for_focus.clear();
            inner.sessions.drain().map(|(_, handle)| handle).collect()
        };

        if !handles.is_empty() {
            self.environment.on_last_session_released();
        }

        let count = handles.len();
        join_all(handles.into_iter().map(destroy_session)).await;
        info!(count, "All sessions released");
    }

    // ========================================================================
    // Interruptions
    // ========================================================================

    /// Pause `id` if it is running and remember it under `reason`.
    pub async fn pause_for(&self, reason: InterruptionReason, id: &str) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };

        let paused = match handle
            .request(|reply| SessionCommand::PauseIfRunning { reply })
            .await
        {
            Ok(paused) => paused,
            Err(error) => {
                debug!(session = id, %error, "Pause for interruption failed");
                false
            }
        };

        if paused {
            let mut inner = self.inner.lock();
            // Released while we were waiting.
            if inner.sessions.contains_key(id) {
                inner.paused(reason).insert(id.to_string());
            }
        }
        paused
    }

    /// Pause every running session for `reason`. Returns how many were paused.
    pub async fn pause_all_for(&self, reason: InterruptionReason) -> usize {
        let ids: Vec<String> = self.inner.lock().sessions.keys().cloned().collect();

        let mut paused = 0;
        for id in ids {
            if self.pause_for(reason, &id).await {
                paused += 1;
            }
        }

        debug!(?reason, paused, "Paused running sessions");
        paused
    }

    /// Resume exactly the sessions paused for `reason` and forget them.
    pub fn resume_for(&self, reason: InterruptionReason) -> usize {
        let handles: Vec<SessionHandle> = {
            let mut inner = self.inner.lock();
            let ids: Vec<String> = inner.paused(reason).drain().collect();
            ids.iter()
                .filter_map(|id| inner.sessions.get(id).cloned())
                .collect()
        };

        for handle in &handles {
            if let Err(error) = handle.send(SessionCommand::Play { source: None }) {
                debug!(session = handle.id(), %error, "Resume failed");
            }
        }

        debug!(?reason, resumed = handles.len(), "Resumed sessions");
        handles.len()
    }

    pub async fn on_focus_change(&self, change: FocusChange) {
        info!(?change, "Audio focus changed");
        match change {
            FocusChange::Gain => {
                self.resume_for(InterruptionReason::Focus);
            }
            _ if self.features.pause_on_focus_loss => {
                self.pause_all_for(InterruptionReason::Focus).await;
            }
            _ => {}
        }
    }

    pub async fn on_telephony_state(&self, state: TelephonyState) {
        info!(?state, "Telephony state changed");
        if !self.features.pause_on_telephony {
            return;
        }

        if state.interrupts_playback() {
            self.pause_all_for(InterruptionReason::Telephony).await;
        } else {
            self.resume_for(InterruptionReason::Telephony);
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionRegistry")
            .field("sessions", &inner.sessions.len())
            .field("paused_for_telephony", &inner.paused_for_telephony)
            .field("paused_for_focus", &inner.paused_for_focus)
            .finish()
    }
}

async fn destroy_session(handle: SessionHandle) {
    if let Err(error) = handle
        .request(|reply| SessionCommand::Destroy { reply })
        .await
    {
        debug!(session = handle.id(), %error, "Destroy on closed session");
    }
}
