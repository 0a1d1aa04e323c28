// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use livestream::Config;
use livestream::constants::{BitratePreset, DEFAULT_STREAM_URL};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.default_url, DEFAULT_STREAM_URL);
    assert!(config.camera_devices.is_empty());
    assert!(config.audio_enabled, "Audio should be enabled by default");
    assert_eq!(config.bitrate_preset, BitratePreset::Medium);
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directories are created on save
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.default_url = "rtmp://example.com/live/key".into();
    config.camera_devices = vec!["/dev/video0".into(), "/dev/video2".into()];
    config.bitrate_preset = BitratePreset::High;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "audio_enabled": false, "video": { "width": 1920 } }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert!(!loaded.audio_enabled);
    assert_eq!(loaded.video.width, 1920);
    assert_eq!(loaded.video.height, 720);
    assert_eq!(loaded.default_url, DEFAULT_STREAM_URL);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, livestream::AppError::Config(_)));
}

#[test]
fn test_video_bitrate_follows_width_and_preset() {
    let mut config = Config::default();
    assert_eq!(config.video_bitrate_kbps(), 2_500);

    config.video.width = 1920;
    config.bitrate_preset = BitratePreset::Low;
    assert_eq!(config.video_bitrate_kbps(), 3_000);
}
