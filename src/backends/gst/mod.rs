// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera capture, effect stage and RTMP push
//!
//! [`GstStreamClient`] plays all three backend roles: it owns the camera
//! preview (the [`RenderSurface`]), applies effects to it (the
//! [`FilterRenderTarget`]) and encodes and pushes the stream (the
//! [`StreamClient`]).
//!
//! Only one pipeline runs at a time. Connecting swaps the preview pipeline for
//! one that also encodes, and a bus-watch thread reports the connection
//! outcome as [`ConnectionEvent`]s. Disconnecting swaps it back.

pub mod devices;
pub mod effects;
pub mod encoders;
pub mod pipeline;

pub use devices::{CameraDevice, list_cameras};

use self::effects::EffectParams;
use self::encoders::{AudioEncoder, VideoEncoder};
use self::pipeline::{CameraSource, PipelineDescription, StreamBranch};
use crate::backends::{
    ConnectionEvent, ConnectionEventSender, EffectKind, FilterRenderTarget, RenderSurface,
    StreamClient,
};
use crate::config::Config;
use crate::constants::timing;
use crate::errors::{BackendError, BackendResult};
use ::gstreamer as gst;
use gst::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Classify a bus error raised while connecting or streaming
///
/// RTMP servers report rejected credentials through the HTTP-like status in
/// the error text, which is all `rtmpsink` passes along.
pub fn classify_stream_error(message: &str) -> ConnectionEvent {
    let lower = message.to_lowercase();
    let auth = ["401", "403", "auth", "unauthorized", "forbidden"]
        .iter()
        .any(|needle| lower.contains(needle));
    if auth {
        ConnectionEvent::AuthFailed
    } else {
        ConnectionEvent::ConnectFailed {
            reason: message.to_string(),
        }
    }
}

/// Encoders chosen by `prepare_*`
#[derive(Debug, Default, Clone, Copy)]
struct PreparedEncoders {
    video: Option<VideoEncoder>,
    /// `Some(None)`: prepared, audio disabled
    audio: Option<Option<AudioEncoder>>,
}

/// Thread reporting the stream pipeline's progress
struct BusWatch {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BusWatch {
    fn spawn(
        pipeline: gst::Pipeline,
        events: ConnectionEventSender,
        connected: Arc<AtomicBool>,
    ) -> BackendResult<Self> {
        let bus = pipeline
            .bus()
            .ok_or_else(|| BackendError::Pipeline("stream pipeline has no bus".into()))?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("rtmp-bus-watch".into())
            .spawn(move || {
                let poll = gst::ClockTime::from_mseconds(
                    timing::BUS_POLL_INTERVAL.as_millis() as u64,
                );
                let mut reported_live = false;
                while !stop_flag.load(Ordering::SeqCst) {
                    let Some(msg) = bus.timed_pop(poll) else {
                        continue;
                    };
                    use gst::MessageView;
                    match msg.view() {
                        MessageView::StateChanged(state)
                            if !reported_live
                                && state.current() == gst::State::Playing
                                && state.src() == Some(pipeline.upcast_ref::<gst::Object>()) =>
                        {
                            reported_live = true;
                            connected.store(true, Ordering::SeqCst);
                            let _ = events.send(ConnectionEvent::ConnectSucceeded);
                        }
                        MessageView::Error(err) => {
                            error!(
                                error = %err.error(),
                                debug = ?err.debug(),
                                source = ?err.src().map(|s| s.name()),
                                "Stream pipeline error"
                            );
                            connected.store(false, Ordering::SeqCst);
                            let _ = events.send(classify_stream_error(&err.error().to_string()));
                            break;
                        }
                        MessageView::Warning(w) => {
                            warn!(
                                warning = %w.error(),
                                source = ?w.src().map(|s| s.name()),
                                "Stream pipeline warning"
                            );
                        }
                        MessageView::Eos(_) => {
                            info!("Stream ended");
                            connected.store(false, Ordering::SeqCst);
                            let _ = events.send(ConnectionEvent::Disconnected);
                            break;
                        }
                        _ => {}
                    }
                }
                debug!("Bus watch exiting");
            })
            .map_err(|e| BackendError::Other(format!("Failed to spawn bus watch: {}", e)))?;

        Ok(Self { stop, handle })
    }

    /// The thread exited after reporting an error or end of stream
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if self.handle.join().is_err() {
            warn!("Bus watch thread panicked");
        }
    }
}

/// What the live pipeline is doing
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Idle,
    Preview,
    Streaming { url: String },
}

struct Inner {
    pipeline: Option<gst::Pipeline>,
    mode: Mode,
    preview_requested: bool,
    device_index: usize,
    effect: Option<EffectKind>,
    encoders: PreparedEncoders,
    watch: Option<BusWatch>,
}

/// GStreamer implementation of the stream, surface and render roles
pub struct GstStreamClient {
    config: Config,
    blur_available: bool,
    events: ConnectionEventSender,
    connected: Arc<AtomicBool>,
    inner: Mutex<Inner>,
}

impl GstStreamClient {
    /// Initialise GStreamer and create an idle client
    ///
    /// Connection progress is sent on `events`.
    pub fn new(config: Config, events: ConnectionEventSender) -> BackendResult<Self> {
        gst::init().map_err(|e| {
            BackendError::InitializationFailed(format!("GStreamer init failed: {}", e))
        })?;

        let blur_available = gst::ElementFactory::find("gaussianblur").is_some();
        if !blur_available {
            warn!("gaussianblur not installed (gst-plugins-bad); blur effects disabled");
        }
        info!(
            devices = config.camera_devices.len(),
            width = config.video.width,
            height = config.video.height,
            "Created GStreamer stream client"
        );

        Ok(Self {
            config,
            blur_available,
            events,
            connected: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(Inner {
                pipeline: None,
                mode: Mode::Idle,
                preview_requested: false,
                device_index: 0,
                effect: None,
                encoders: PreparedEncoders::default(),
                watch: None,
            }),
        })
    }

    /// Camera currently feeding the pipeline
    pub fn current_source(&self) -> CameraSource {
        self.source_at(self.lock().device_index)
    }

    fn source_at(&self, index: usize) -> CameraSource {
        match self.config.camera_devices.get(index) {
            Some(path) => CameraSource::Device(path.clone()),
            None => CameraSource::Auto,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn describe(
        &self,
        inner: &Inner,
        stream_url: Option<&str>,
    ) -> BackendResult<PipelineDescription> {
        let description = PipelineDescription::preview(
            self.source_at(inner.device_index),
            self.config.video,
            self.blur_available,
        );
        let Some(url) = stream_url else {
            return Ok(description);
        };

        let (Some(video_encoder), Some(audio)) = (inner.encoders.video, inner.encoders.audio)
        else {
            return Err(BackendError::Pipeline("encoders not prepared".into()));
        };
        Ok(description.with_stream(StreamBranch {
            url: url.to_string(),
            video_encoder,
            video_bitrate_kbps: self.config.video_bitrate_kbps(),
            audio: audio.map(|encoder| (encoder, self.config.audio_bitrate_kbps)),
        }))
    }

    /// Parse, configure and start a pipeline from `description`
    fn launch(
        &self,
        description: &PipelineDescription,
        effect: Option<EffectKind>,
    ) -> BackendResult<gst::Pipeline> {
        let launch = description.render();
        debug!(pipeline = %launch, "Launching pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| BackendError::Pipeline(format!("Failed to parse pipeline: {}", e)))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| BackendError::Pipeline("Launch result is not a pipeline".into()))?;

        EffectParams::for_effect(effect).apply(&pipeline);

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            let _ = pipeline.set_state(gst::State::Null);
            BackendError::Pipeline(format!("Failed to start pipeline: {}", e))
        })?;
        Ok(pipeline)
    }

    /// Stop the bus watch and the running pipeline
    fn teardown(&self, inner: &mut Inner) {
        if let Some(watch) = inner.watch.take() {
            watch.stop();
        }
        if let Some(pipeline) = inner.pipeline.take() {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                warn!(error = %e, "Failed to stop pipeline");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        inner.mode = Mode::Idle;
    }

    /// Start the preview-only pipeline and wait for it to come up
    fn launch_preview(&self, inner: &mut Inner) -> BackendResult<()> {
        let description = self.describe(inner, None)?;
        let pipeline = self.launch(&description, inner.effect)?;

        let timeout = gst::ClockTime::from_seconds(timing::STATE_CHANGE_TIMEOUT.as_secs());
        let (result, state, _pending) = pipeline.state(timeout);
        if result.is_err() || state != gst::State::Playing {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::Pipeline(
                "Preview pipeline failed to reach Playing state".into(),
            ));
        }

        inner.pipeline = Some(pipeline);
        inner.mode = Mode::Preview;
        Ok(())
    }

    /// Start the stream pipeline; progress is reported by the bus watch
    fn launch_stream(&self, inner: &mut Inner, url: &str) -> BackendResult<()> {
        let description = self.describe(inner, Some(url))?;
        let pipeline = self.launch(&description, inner.effect)?;
        let watch = match BusWatch::spawn(
            pipeline.clone(),
            self.events.clone(),
            Arc::clone(&self.connected),
        ) {
            Ok(watch) => watch,
            Err(e) => {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(e);
            }
        };

        inner.pipeline = Some(pipeline);
        inner.watch = Some(watch);
        inner.mode = Mode::Streaming {
            url: url.to_string(),
        };
        Ok(())
    }

    fn restore_preview(&self, inner: &mut Inner) {
        if inner.preview_requested {
            if let Err(e) = self.launch_preview(inner) {
                error!(error = %e, "Failed to restore preview");
                inner.preview_requested = false;
            }
        }
    }
}

impl StreamClient for GstStreamClient {
    fn prepare_audio(&self) -> bool {
        let audio = if self.config.audio_enabled {
            match encoders::select_audio_encoder() {
                Some(encoder) => Some(encoder),
                None => return false,
            }
        } else {
            debug!("Audio disabled, streaming video only");
            None
        };
        self.lock().encoders.audio = Some(audio);
        true
    }

    fn prepare_video(&self) -> bool {
        let video = encoders::select_video_encoder();
        self.lock().encoders.video = video;
        video.is_some()
    }

    fn connect(&self, url: &str) {
        let mut inner = self.lock();
        if matches!(inner.mode, Mode::Streaming { .. }) {
            let ended = inner.watch.as_ref().is_none_or(BusWatch::is_finished);
            if !ended {
                debug!("Already streaming, ignoring connect");
                return;
            }
            // The previous stream ended but its pipeline was never released
            info!("Replacing finished stream pipeline");
        }

        let _ = self.events.send(ConnectionEvent::ConnectStarted {
            url: url.to_string(),
        });

        // The camera can only be opened by one pipeline at a time
        self.teardown(&mut inner);
        if let Err(e) = self.launch_stream(&mut inner, url) {
            error!(error = %e, "Failed to start stream pipeline");
            let _ = self.events.send(ConnectionEvent::ConnectFailed {
                reason: e.to_string(),
            });
            self.restore_preview(&mut inner);
        }
    }

    fn disconnect(&self) {
        let mut inner = self.lock();
        if !matches!(inner.mode, Mode::Streaming { .. }) && inner.watch.is_none() {
            return;
        }
        info!("Tearing down stream");
        self.teardown(&mut inner);
        self.restore_preview(&mut inner);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_preview_active(&self) -> bool {
        let inner = self.lock();
        inner.preview_requested && inner.pipeline.is_some()
    }

    fn start_preview(&self) -> BackendResult<()> {
        let mut inner = self.lock();
        if inner.pipeline.is_none() {
            self.launch_preview(&mut inner)?;
        }
        inner.preview_requested = true;
        Ok(())
    }

    fn stop_preview(&self) {
        let mut inner = self.lock();
        inner.preview_requested = false;
        // A live stream keeps its pipeline until disconnect
        if inner.mode == Mode::Preview {
            self.teardown(&mut inner);
            info!("Preview stopped");
        }
    }

    fn switch_camera(&self) -> BackendResult<()> {
        let count = self.config.camera_devices.len();
        if count < 2 {
            return Err(BackendError::DeviceNotFound(
                "no other camera configured".into(),
            ));
        }

        let mut inner = self.lock();
        let previous = inner.device_index;
        inner.device_index = (previous + 1) % count;
        info!(device = ?self.source_at(inner.device_index), "Switching camera");

        let was = inner.mode.clone();
        let relaunch = match &was {
            Mode::Idle => Ok(()),
            Mode::Preview => {
                self.teardown(&mut inner);
                self.launch_preview(&mut inner)
            }
            Mode::Streaming { url } => {
                self.teardown(&mut inner);
                self.launch_stream(&mut inner, url)
            }
        };

        if let Err(e) = relaunch {
            error!(error = %e, "Camera switch failed, reopening previous camera");
            inner.device_index = previous;
            if let Mode::Streaming { .. } = was {
                // The outgoing stream is gone with the old pipeline
                let _ = self.events.send(ConnectionEvent::ConnectFailed {
                    reason: e.to_string(),
                });
            }
            self.restore_preview(&mut inner);
            return Err(e);
        }
        Ok(())
    }
}

impl RenderSurface for GstStreamClient {
    fn is_valid(&self) -> bool {
        self.lock()
            .pipeline
            .as_ref()
            .is_some_and(|p| p.current_state() == gst::State::Playing)
    }
}

impl FilterRenderTarget for GstStreamClient {
    fn install_effect(&self, kind: EffectKind) {
        let mut inner = self.lock();
        inner.effect = Some(kind);
        if let Some(pipeline) = &inner.pipeline {
            EffectParams::for_effect(Some(kind)).apply(pipeline);
        }
    }

    fn clear_effects(&self) {
        let mut inner = self.lock();
        inner.effect = None;
        if let Some(pipeline) = &inner.pipeline {
            EffectParams::NEUTRAL.apply(pipeline);
        }
    }
}

impl Drop for GstStreamClient {
    fn drop(&mut self) {
        let mut inner = self.lock();
        self.teardown(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_classified() {
        assert_eq!(
            classify_stream_error("Server returned 401 Unauthorized"),
            ConnectionEvent::AuthFailed
        );
        assert_eq!(
            classify_stream_error("Authentication rejected"),
            ConnectionEvent::AuthFailed
        );
    }

    #[test]
    fn test_other_errors_keep_reason() {
        assert_eq!(
            classify_stream_error("Could not open resource for writing."),
            ConnectionEvent::ConnectFailed {
                reason: "Could not open resource for writing.".into()
            }
        );
    }
}
