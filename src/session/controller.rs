// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle controller
//!
//! Sequences preview, encoder preparation, connection and teardown on top of
//! the backend contracts, and folds connection callbacks into the published
//! [`SessionState`].
//!
//! Two sources drive the controller concurrently: user intents from the
//! presentation thread and [`ConnectionEvent`]s from the client's own worker
//! thread. All of them end up in [`SessionController::apply`], which reduces
//! and publishes under one lock, so a straggling callback can never interleave
//! with a stop into a torn update.

use super::filters::{FilterPipeline, FilterSelection};
use super::state::{SessionEvent, SessionState, reduce};
use crate::backends::{AttachedResources, ConnectionEvent, ConnectionEventReceiver};
use crate::config::Config;
use crate::constants::PREVIEW_LOST_REASON;
use crate::errors::StartRejection;
use futures::Stream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Snapshot before and after one reduction
struct Transition {
    before: SessionState,
    after: SessionState,
}

/// The session state machine and sole writer of [`SessionState`]
pub struct SessionController {
    id: Uuid,
    /// Authoritative state; reduced and published while held
    session: Mutex<SessionState>,
    state_tx: watch::Sender<SessionState>,
    /// Camera/encoder resource and preview surface, once attached
    resources: Mutex<Option<AttachedResources>>,
    /// Serializes every command issued to the attached client
    command_gate: Mutex<()>,
    filters: FilterPipeline,
}

impl SessionController {
    pub fn new(initial_url: impl Into<String>) -> Self {
        let initial = SessionState::new(initial_url);
        let (state_tx, _) = watch::channel(initial.clone());
        let id = Uuid::new_v4();
        debug!(session = %id, "Creating session controller");
        Self {
            id,
            session: Mutex::new(initial),
            state_tx,
            resources: Mutex::new(None),
            command_gate: Mutex::new(()),
            filters: FilterPipeline::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_url.clone())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current snapshot
    pub fn snapshot(&self) -> SessionState {
        lock(&self.session).clone()
    }

    /// Stream of snapshots for a presentation layer
    ///
    /// Every call returns an independent stream. It starts with the snapshot
    /// current at first poll and then yields one value per published
    /// transition; a slow consumer skips intermediate values but always
    /// receives the latest one.
    pub fn subscribe(&self) -> impl Stream<Item = SessionState> + Send + 'static {
        let mut rx = self.state_tx.subscribe();
        async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            yield current;
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                yield next;
            }
        }
    }

    // =========================================================================
    // Resource lifecycle
    // =========================================================================

    /// Bind the camera/encoder resource and preview surface
    ///
    /// Resources are bound once per session; returns `false` if some are
    /// already attached.
    pub fn attach(&self, resources: AttachedResources) -> bool {
        let _gate = lock(&self.command_gate);
        let mut slot = lock(&self.resources);
        if slot.is_some() {
            warn!(session = %self.id, "Camera resources already attached, ignoring");
            return false;
        }
        self.filters.attach_target(Arc::clone(&resources.render));
        *slot = Some(resources);
        info!(session = %self.id, "Camera resources attached");
        true
    }

    /// Release the attached resources, stopping stream and preview first
    pub fn detach(&self) {
        let _gate = lock(&self.command_gate);
        let Some(resources) = lock(&self.resources).take() else {
            return;
        };

        let state = self.snapshot();
        if state.streaming || state.attempt_outstanding || resources.client.is_connected() {
            resources.client.disconnect();
        }
        if resources.client.is_preview_active() {
            resources.client.stop_preview();
        }
        self.filters.detach_target();
        self.apply(SessionEvent::ResourcesDetached);
        info!(session = %self.id, "Camera resources detached");
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.resources).is_some()
    }

    /// Start the camera preview on the attached resource
    pub fn start_preview(&self) {
        let _gate = lock(&self.command_gate);
        let Some(resources) = self.resources() else {
            self.reject(StartRejection::PreviewNotInitialized);
            return;
        };

        if resources.client.is_preview_active() {
            if !self.snapshot().preview_on {
                self.apply(SessionEvent::PreviewStarted);
            }
            return;
        }

        match resources.client.start_preview() {
            Ok(()) => {
                info!(session = %self.id, "Preview started");
                self.apply(SessionEvent::PreviewStarted);
            }
            Err(err) => {
                error!(session = %self.id, error = %err, "Failed to start preview");
                self.apply(SessionEvent::PreviewFailed(err.to_string()));
            }
        }
    }

    // =========================================================================
    // User intents
    // =========================================================================

    /// Store the destination exactly as typed
    pub fn set_url(&self, url: impl Into<String>) {
        self.apply(SessionEvent::UrlChanged(url.into()));
    }

    /// Validate, prepare encoders and issue the connect command
    ///
    /// Returns immediately. `connecting` is only raised once the client
    /// reports that the connection started.
    pub fn request_start(&self) {
        let _gate = lock(&self.command_gate);

        let Some(resources) = self.resources() else {
            self.reject(StartRejection::PreviewNotInitialized);
            return;
        };

        let state = self.snapshot();
        let url = state.trimmed_url().to_string();
        if url.is_empty() {
            self.reject(StartRejection::UrlRequired);
            return;
        }

        if !resources.surface.is_valid() {
            self.reject(StartRejection::PreviewNotReady);
            return;
        }

        if state.streaming || state.attempt_outstanding || resources.client.is_connected() {
            debug!(session = %self.id, "Start requested while already streaming, ignoring");
            return;
        }

        let audio_ready = resources.client.prepare_audio();
        let video_ready = resources.client.prepare_video();
        if !(audio_ready && video_ready) {
            warn!(
                session = %self.id,
                audio_ready,
                video_ready,
                "Encoder preparation failed"
            );
            self.reject(StartRejection::EncoderInitFailed);
            return;
        }

        // Record the attempt before the client can report on it
        self.apply(SessionEvent::ConnectIssued);
        info!(session = %self.id, url = %url, "Connecting");
        resources.client.connect(&url);
    }

    /// Stop streaming and the preview; safe from any state
    pub fn request_stop(&self) {
        let _gate = lock(&self.command_gate);

        let mut preview_stopped = false;
        if let Some(resources) = self.resources() {
            let state = self.snapshot();
            if state.streaming || state.attempt_outstanding || resources.client.is_connected() {
                info!(session = %self.id, "Stopping stream");
                resources.client.disconnect();
            }
            if resources.client.is_preview_active() {
                resources.client.stop_preview();
            }
            // Also covers a preview the client already lost on its own
            preview_stopped = !resources.client.is_preview_active();
        }

        self.apply(SessionEvent::StopRequested { preview_stopped });
    }

    /// Toggle a visual effect; returns the resulting selection
    pub fn toggle_filter(&self, selection: FilterSelection) -> FilterSelection {
        self.filters.toggle(selection)
    }

    pub fn active_filter(&self) -> FilterSelection {
        self.filters.active()
    }

    /// Switch to the next camera
    ///
    /// Failures are logged and otherwise ignored: the current camera keeps
    /// feeding preview and stream.
    pub fn switch_camera(&self) {
        let _gate = lock(&self.command_gate);
        let Some(resources) = self.resources() else {
            debug!(session = %self.id, "Switch camera ignored, no camera attached");
            return;
        };
        match resources.client.switch_camera() {
            Ok(()) => info!(session = %self.id, "Switched camera"),
            Err(err) => warn!(session = %self.id, error = %err, "Camera switch failed"),
        }
        self.reconcile_preview(&resources);
    }

    // =========================================================================
    // Connection callbacks
    // =========================================================================

    /// Fold one client notification into the session
    ///
    /// Must not be called from inside a [`StreamClient`] method, since those
    /// run while the command gate is held.
    ///
    /// [`StreamClient`]: crate::backends::StreamClient
    pub fn handle_connection_event(&self, event: ConnectionEvent) {
        let _gate = lock(&self.command_gate);
        debug!(session = %self.id, ?event, "Connection event");

        match &event {
            ConnectionEvent::ConnectFailed { reason } => {
                warn!(session = %self.id, reason = %reason, "Connection failed");
            }
            ConnectionEvent::AuthFailed => {
                warn!(session = %self.id, "Authentication failed");
            }
            ConnectionEvent::ConnectSucceeded => {
                info!(session = %self.id, "Connection established");
            }
            ConnectionEvent::Disconnected => {
                info!(session = %self.id, "Disconnected");
            }
            ConnectionEvent::ConnectStarted { .. } | ConnectionEvent::AuthSucceeded => {}
        }

        let failed = matches!(
            event,
            ConnectionEvent::ConnectFailed { .. } | ConnectionEvent::AuthFailed
        );
        let succeeded = matches!(event, ConnectionEvent::ConnectSucceeded);
        let ended = matches!(event, ConnectionEvent::Disconnected);
        let Transition { before, after } = self.apply(event.into());

        let Some(resources) = self.resources() else {
            return;
        };

        if failed {
            // A failed connect may leave the transport half open
            resources.client.disconnect();
            let applied = !after.preview_on && (before.attempt_outstanding || before.streaming);
            if applied && resources.client.is_preview_active() {
                resources.client.stop_preview();
            }
        } else if succeeded && !after.streaming && resources.client.is_connected() {
            warn!(session = %self.id, "Connection completed after stop, disconnecting");
            resources.client.disconnect();
        } else if ended {
            // The remote end closed; release the local side of the stream too
            resources.client.disconnect();
        }
        self.reconcile_preview(&resources);
    }

    /// Forward client notifications until the channel closes
    pub async fn pump_events(self: Arc<Self>, mut events: ConnectionEventReceiver) {
        while let Some(event) = events.recv().await {
            let controller = Arc::clone(&self);
            // Client calls made while handling an event may block on hardware
            let handled =
                tokio::task::spawn_blocking(move || controller.handle_connection_event(event))
                    .await;
            if let Err(err) = handled {
                error!(session = %self.id, error = %err, "Connection event handler panicked");
            }
        }
        debug!(session = %self.id, "Connection event channel closed");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn resources(&self) -> Option<AttachedResources> {
        lock(&self.resources).clone()
    }

    /// Report a preview the client dropped without being asked to
    fn reconcile_preview(&self, resources: &AttachedResources) {
        if self.snapshot().preview_on && !resources.client.is_preview_active() {
            warn!(session = %self.id, "Preview lost by the camera backend");
            self.apply(SessionEvent::PreviewFailed(PREVIEW_LOST_REASON.into()));
        }
    }

    fn reject(&self, rejection: StartRejection) {
        info!(session = %self.id, reason = %rejection, "Start rejected");
        self.apply(SessionEvent::StartRejected(rejection));
    }

    /// Reduce `event` into the session and publish the result
    fn apply(&self, event: SessionEvent) -> Transition {
        let mut session = lock(&self.session);
        let before = session.clone();
        let after = reduce(&before, &event);
        if after != before {
            debug!(
                session = %self.id,
                phase = %after.phase(),
                preview_on = after.preview_on,
                error = ?after.last_error,
                "Session transition"
            );
            *session = after.clone();
            self.state_tx.send_replace(after.clone());
        }
        Transition { before, after }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("state", &self.snapshot())
            .field("attached", &self.is_attached())
            .field("filter", &self.filters.active())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
