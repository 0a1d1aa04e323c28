// SPDX-License-Identifier: GPL-3.0-only

//! Persisted user configuration
//!
//! Stored as pretty-printed JSON at `$XDG_CONFIG_HOME/livestream/config.json`.
//! Missing fields fall back to their defaults so older files keep loading.

use crate::constants::{BitratePreset, DEFAULT_STREAM_URL};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = "livestream";
const CONFIG_FILE_NAME: &str = "config.json";

/// Capture/encode format for the outgoing video
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Framerate
    pub framerate: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            framerate: 30,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL placed in the destination field when a session starts
    pub default_url: String,
    /// Camera device paths to cycle through (empty = let GStreamer pick)
    pub camera_devices: Vec<String>,
    /// Outgoing video format
    pub video: VideoSettings,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
    /// Whether to capture and send a microphone track
    pub audio_enabled: bool,
    /// AAC bitrate in kbps
    pub audio_bitrate_kbps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_STREAM_URL.to_string(),
            camera_devices: Vec::new(),
            video: VideoSettings::default(),
            bitrate_preset: BitratePreset::default(),
            audio_enabled: true,
            audio_bitrate_kbps: 128,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no config directory available".into()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Video bitrate in kbps for the configured width and preset
    pub fn video_bitrate_kbps(&self) -> u32 {
        self.bitrate_preset.bitrate_kbps(self.video.width)
    }
}
