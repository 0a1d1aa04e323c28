// SPDX-License-Identifier: GPL-3.0-only

//! Recording test double for the backend contracts

#![allow(dead_code)]

use livestream::backends::{
    AttachedResources, ConnectionEvent, ConnectionEventSender, EffectKind, FilterRenderTarget,
    RenderSurface, StreamClient,
};
use livestream::errors::{BackendError, BackendResult};
use livestream::{SessionController, SessionState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const URL: &str = "rtmp://host/app/key";

/// Every call the controller made on the backend, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PrepareAudio,
    PrepareVideo,
    Connect(String),
    Disconnect,
    StartPreview,
    StopPreview,
    SwitchCamera,
    Install(EffectKind),
    Clear,
}

pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    pub surface_valid: AtomicBool,
    pub audio_ok: AtomicBool,
    pub video_ok: AtomicBool,
    pub preview_ok: AtomicBool,
    pub switch_ok: AtomicBool,
    pub connected: AtomicBool,
    pub preview_active: AtomicBool,
    /// A stream pipeline is held, live or finished, until `disconnect`
    pub stream_open: AtomicBool,
    /// When set, `connect` reports progress like a real client would
    events: Option<ConnectionEventSender>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// A client that emits `ConnectStarted` and `ConnectSucceeded` on connect
    pub fn with_events(events: ConnectionEventSender) -> Arc<Self> {
        Arc::new(Self::build(Some(events)))
    }

    fn build(events: Option<ConnectionEventSender>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            surface_valid: AtomicBool::new(true),
            audio_ok: AtomicBool::new(true),
            video_ok: AtomicBool::new(true),
            preview_ok: AtomicBool::new(true),
            switch_ok: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            preview_active: AtomicBool::new(false),
            stream_open: AtomicBool::new(false),
            events,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl StreamClient for RecordingClient {
    fn prepare_audio(&self) -> bool {
        self.record(Call::PrepareAudio);
        self.audio_ok.load(Ordering::SeqCst)
    }

    fn prepare_video(&self) -> bool {
        self.record(Call::PrepareVideo);
        self.video_ok.load(Ordering::SeqCst)
    }

    fn connect(&self, url: &str) {
        self.record(Call::Connect(url.to_string()));
        // Like the GStreamer client, a held stream swallows further connects
        if self.stream_open.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(events) = &self.events {
            self.connected.store(true, Ordering::SeqCst);
            let _ = events.send(ConnectionEvent::ConnectStarted {
                url: url.to_string(),
            });
            let _ = events.send(ConnectionEvent::ConnectSucceeded);
        }
    }

    fn disconnect(&self) {
        self.record(Call::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        self.stream_open.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_preview_active(&self) -> bool {
        self.preview_active.load(Ordering::SeqCst)
    }

    fn start_preview(&self) -> BackendResult<()> {
        self.record(Call::StartPreview);
        if self.preview_ok.load(Ordering::SeqCst) {
            self.preview_active.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(BackendError::DeviceNotFound("camera busy".into()))
        }
    }

    fn stop_preview(&self) {
        self.record(Call::StopPreview);
        self.preview_active.store(false, Ordering::SeqCst);
    }

    fn switch_camera(&self) -> BackendResult<()> {
        self.record(Call::SwitchCamera);
        if self.switch_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::DeviceNotFound("no other camera".into()))
        }
    }
}

impl RenderSurface for RecordingClient {
    fn is_valid(&self) -> bool {
        self.surface_valid.load(Ordering::SeqCst)
    }
}

impl FilterRenderTarget for RecordingClient {
    fn install_effect(&self, kind: EffectKind) {
        self.record(Call::Install(kind));
    }

    fn clear_effects(&self) {
        self.record(Call::Clear);
    }
}

/// Controller with `client` attached, preview running and `URL` set
pub fn attached(client: &Arc<RecordingClient>) -> SessionController {
    let controller = SessionController::new(URL);
    assert!(controller.attach(AttachedResources::from_backend(Arc::clone(client))));
    controller.start_preview();
    client.clear_calls();
    controller
}

/// Drive `controller` through a successful connect
pub fn go_live(controller: &SessionController, client: &RecordingClient) -> SessionState {
    controller.request_start();
    controller.handle_connection_event(ConnectionEvent::ConnectStarted { url: URL.into() });
    client.set(&client.connected, true);
    controller.handle_connection_event(ConnectionEvent::ConnectSucceeded);
    controller.snapshot()
}
