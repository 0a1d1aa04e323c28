// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for capture, encoding and transport
//!
//! The session core never talks to hardware or the network directly. It only
//! sees the narrow contracts defined here:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              SessionController              │
//! └──────┬───────────────┬───────────────┬──────┘
//!        │               │               │        ▲
//!        ▼               ▼               ▼        │ ConnectionEvent
//! ┌──────────────┐ ┌─────────────┐ ┌─────────────┐│ (mpsc, any thread)
//! │ StreamClient │ │RenderSurface│ │FilterRender-││
//! │ (encode/net) │ │ (is_valid)  │ │   Target    ││
//! └──────┬───────┘ └─────────────┘ └─────────────┘│
//!        └────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`gst`]: GStreamer-backed camera capture, effect stage and RTMP push

pub mod gst;

use crate::errors::BackendResult;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Visual effect installable on the render path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Skin softening
    Beauty,
    /// Stylised, posterised look
    Cartoon,
    /// Gaussian blur
    Blur,
}

/// Live camera-preview drawing surface
pub trait RenderSurface: Send + Sync {
    /// Whether the surface can receive frames right now
    ///
    /// Reflects surface lifecycle that can change between frames, so callers
    /// poll it at the moment they need it instead of caching the answer.
    fn is_valid(&self) -> bool;
}

/// Capture + encoder + network connection resource
///
/// Connection progress is never reported through return values: `connect`
/// returns immediately and the outcome arrives later as a [`ConnectionEvent`]
/// on the channel the client was built with. Implementations must not emit
/// events synchronously from inside `connect`.
pub trait StreamClient: Send + Sync {
    /// Prepare the audio encoder; `false` if it cannot be initialised
    fn prepare_audio(&self) -> bool;

    /// Prepare the video encoder; `false` if it cannot be initialised
    fn prepare_video(&self) -> bool;

    /// Begin connecting to `url` without blocking
    fn connect(&self, url: &str);

    /// Tear down the outgoing stream
    ///
    /// Must be idempotent: it is also issued after a failed connect, on a
    /// transport that may already be closed.
    fn disconnect(&self);

    /// Whether a stream is currently being transmitted
    fn is_connected(&self) -> bool;

    /// Whether the camera preview is running
    fn is_preview_active(&self) -> bool;

    /// Start the camera preview
    fn start_preview(&self) -> BackendResult<()>;

    /// Stop the camera preview (idempotent)
    fn stop_preview(&self);

    /// Switch to the next camera (front/back, or next configured device)
    fn switch_camera(&self) -> BackendResult<()>;
}

/// Render path that effects are installed on
pub trait FilterRenderTarget: Send + Sync {
    /// Install exactly `kind`, replacing whatever effect was installed
    fn install_effect(&self, kind: EffectKind);

    /// Remove all effects
    fn clear_effects(&self);
}

/// Asynchronous connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The client began connecting to `url`
    ConnectStarted { url: String },
    /// The connection is established and media is flowing
    ConnectSucceeded,
    /// Connecting failed or the live connection broke
    ConnectFailed { reason: String },
    /// Graceful or remote-initiated end of stream
    Disconnected,
    /// The server rejected the credentials
    AuthFailed,
    /// The server accepted the credentials
    AuthSucceeded,
}

/// Sending half handed to a [`StreamClient`]
pub type ConnectionEventSender = mpsc::UnboundedSender<ConnectionEvent>;

/// Receiving half consumed by `SessionController::pump_events`
pub type ConnectionEventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Create the channel that carries client callbacks into the session
pub fn connection_events() -> (ConnectionEventSender, ConnectionEventReceiver) {
    mpsc::unbounded_channel()
}

/// Handles for one attached camera: encoder/connection, surface and render path
#[derive(Clone)]
pub struct AttachedResources {
    pub client: Arc<dyn StreamClient>,
    pub surface: Arc<dyn RenderSurface>,
    pub render: Arc<dyn FilterRenderTarget>,
}

impl AttachedResources {
    pub fn new(
        client: Arc<dyn StreamClient>,
        surface: Arc<dyn RenderSurface>,
        render: Arc<dyn FilterRenderTarget>,
    ) -> Self {
        Self {
            client,
            surface,
            render,
        }
    }

    /// Build from one object that plays all three roles
    pub fn from_backend<T>(backend: Arc<T>) -> Self
    where
        T: StreamClient + RenderSurface + FilterRenderTarget + 'static,
    {
        Self {
            client: backend.clone(),
            surface: backend.clone(),
            render: backend,
        }
    }
}

impl std::fmt::Debug for AttachedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedResources")
            .field("connected", &self.client.is_connected())
            .field("preview_active", &self.client.is_preview_active())
            .field("surface_valid", &self.surface.is_valid())
            .finish()
    }
}
