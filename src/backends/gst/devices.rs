// SPDX-License-Identifier: GPL-3.0-only

//! Camera enumeration through the GStreamer device monitor

use crate::errors::{BackendError, BackendResult};
use ::gstreamer as gst;
use gst::prelude::*;
use tracing::debug;

/// A video capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human readable name
    pub name: String,
    /// Device node, when the provider exposes one
    pub path: Option<String>,
}

/// Properties providers use for the device node
const PATH_PROPERTIES: [&str; 3] = ["api.v4l2.path", "device.path", "object.path"];

/// List all video sources currently visible to GStreamer
pub fn list_cameras() -> BackendResult<Vec<CameraDevice>> {
    gst::init().map_err(|e| {
        BackendError::InitializationFailed(format!("GStreamer init failed: {}", e))
    })?;

    let monitor = gst::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);
    monitor
        .start()
        .map_err(|e| BackendError::Other(format!("Failed to start device monitor: {}", e)))?;

    let cameras = monitor
        .devices()
        .iter()
        .map(|device| {
            let path = device.properties().and_then(|props| {
                PATH_PROPERTIES
                    .iter()
                    .find_map(|key| props.get::<String>(*key).ok())
            });
            CameraDevice {
                name: device.display_name().to_string(),
                path,
            }
        })
        .collect::<Vec<_>>();
    monitor.stop();

    debug!(count = cameras.len(), "Enumerated cameras");
    Ok(cameras)
}
