// SPDX-License-Identifier: GPL-3.0-only

//! Encoder discovery for the outgoing stream
//!
//! FLV over RTMP carries H.264 video and AAC audio, so only those codecs are
//! considered. Hardware encoders are preferred when their plugin is present.

use ::gstreamer as gst;
use tracing::{debug, info, warn};

/// Elements the video branch needs besides the encoder itself
const VIDEO_SUPPORT_ELEMENTS: [&str; 3] = ["h264parse", "flvmux", "rtmpsink"];

/// Elements the audio branch needs besides the encoder itself
const AUDIO_SUPPORT_ELEMENTS: [&str; 4] =
    ["autoaudiosrc", "audioconvert", "audioresample", "aacparse"];

/// H.264 encoders in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoder {
    VaapiH264,
    NvH264,
    V4l2H264,
    X264,
    OpenH264,
}

impl VideoEncoder {
    pub const PRIORITY: [VideoEncoder; 5] = [
        VideoEncoder::VaapiH264,
        VideoEncoder::NvH264,
        VideoEncoder::V4l2H264,
        VideoEncoder::X264,
        VideoEncoder::OpenH264,
    ];

    pub fn factory_name(&self) -> &'static str {
        match self {
            VideoEncoder::VaapiH264 => "vaapih264enc",
            VideoEncoder::NvH264 => "nvh264enc",
            VideoEncoder::V4l2H264 => "v4l2h264enc",
            VideoEncoder::X264 => "x264enc",
            VideoEncoder::OpenH264 => "openh264enc",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            VideoEncoder::VaapiH264 | VideoEncoder::NvH264 | VideoEncoder::V4l2H264
        )
    }

    /// Launch-syntax element with live-friendly settings
    ///
    /// `framerate` sets the keyframe interval to one second, which is what
    /// most ingest servers expect.
    pub fn launch_fragment(&self, bitrate_kbps: u32, framerate: u32) -> String {
        match self {
            VideoEncoder::X264 => format!(
                "x264enc tune=zerolatency speed-preset=veryfast bitrate={} key-int-max={}",
                bitrate_kbps, framerate
            ),
            VideoEncoder::OpenH264 => format!(
                "openh264enc rate-control=bitrate usage-type=camera bitrate={} gop-size={}",
                bitrate_kbps * 1000,
                framerate
            ),
            VideoEncoder::VaapiH264 => format!(
                "vaapih264enc rate-control=cbr bitrate={} keyframe-period={}",
                bitrate_kbps, framerate
            ),
            VideoEncoder::NvH264 => format!(
                "nvh264enc rc-mode=cbr bitrate={} gop-size={} zerolatency=true",
                bitrate_kbps, framerate
            ),
            // V4L2 M2M encoders expose bitrate through extra-controls only
            VideoEncoder::V4l2H264 => "v4l2h264enc".to_string(),
        }
    }
}

/// AAC encoders in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoder {
    FdkAac,
    AvencAac,
    VoAacEnc,
    Faac,
}

impl AudioEncoder {
    pub const PRIORITY: [AudioEncoder; 4] = [
        AudioEncoder::FdkAac,
        AudioEncoder::AvencAac,
        AudioEncoder::VoAacEnc,
        AudioEncoder::Faac,
    ];

    pub fn factory_name(&self) -> &'static str {
        match self {
            AudioEncoder::FdkAac => "fdkaacenc",
            AudioEncoder::AvencAac => "avenc_aac",
            AudioEncoder::VoAacEnc => "voaacenc",
            AudioEncoder::Faac => "faac",
        }
    }

    pub fn launch_fragment(&self, bitrate_kbps: u32) -> String {
        // All of these take bits per second
        format!("{} bitrate={}", self.factory_name(), bitrate_kbps * 1000)
    }
}

/// Element factory names from `names` that are not installed
pub fn missing_elements<'a>(names: &[&'a str]) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .filter(|name| gst::ElementFactory::find(name).is_none())
        .collect()
}

/// Pick the best installed H.264 encoder, if the FLV/RTMP path is available
pub fn select_video_encoder() -> Option<VideoEncoder> {
    let missing = missing_elements(&VIDEO_SUPPORT_ELEMENTS);
    if !missing.is_empty() {
        warn!(?missing, "Missing GStreamer elements for the video stream");
        return None;
    }

    let selected = VideoEncoder::PRIORITY
        .into_iter()
        .find(|encoder| gst::ElementFactory::find(encoder.factory_name()).is_some());
    match selected {
        Some(encoder) => info!(
            encoder = encoder.factory_name(),
            hardware = encoder.is_hardware(),
            "Selected video encoder"
        ),
        None => warn!(
            "No H.264 encoder available. Please install gstreamer1-plugins-ugly (x264enc) or gstreamer1-plugin-openh264"
        ),
    }
    selected
}

/// Pick the best installed AAC encoder, if audio capture is available
pub fn select_audio_encoder() -> Option<AudioEncoder> {
    let missing = missing_elements(&AUDIO_SUPPORT_ELEMENTS);
    if !missing.is_empty() {
        warn!(?missing, "Missing GStreamer elements for the audio stream");
        return None;
    }

    let selected = AudioEncoder::PRIORITY
        .into_iter()
        .find(|encoder| gst::ElementFactory::find(encoder.factory_name()).is_some());
    match selected {
        Some(encoder) => info!(encoder = encoder.factory_name(), "Selected audio encoder"),
        None => debug!("No AAC encoder installed"),
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_encoders_come_first() {
        let first_software = VideoEncoder::PRIORITY
            .iter()
            .position(|e| !e.is_hardware())
            .unwrap();
        assert!(
            VideoEncoder::PRIORITY[first_software..]
                .iter()
                .all(|e| !e.is_hardware())
        );
    }

    #[test]
    fn test_x264_fragment_uses_kbps() {
        let fragment = VideoEncoder::X264.launch_fragment(2500, 30);
        assert!(fragment.starts_with("x264enc "));
        assert!(fragment.contains("bitrate=2500"));
        assert!(fragment.contains("key-int-max=30"));
        assert!(fragment.contains("tune=zerolatency"));
    }

    #[test]
    fn test_openh264_fragment_uses_bps() {
        let fragment = VideoEncoder::OpenH264.launch_fragment(2500, 30);
        assert!(fragment.contains("bitrate=2500000"));
    }

    #[test]
    fn test_aac_fragment() {
        assert_eq!(
            AudioEncoder::AvencAac.launch_fragment(128),
            "avenc_aac bitrate=128000"
        );
    }
}
