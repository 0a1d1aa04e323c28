// SPDX-License-Identifier: GPL-3.0-only

//! Launch descriptions for the preview and stream pipelines
//!
//! Both pipelines share the same front half:
//!
//! ```text
//! camera -> scale/rate caps -> videobalance -> [gaussianblur] -> tee -> preview sink
//! ```
//!
//! The stream pipeline adds an H.264 branch off the tee and, when enabled, an
//! AAC branch from the default microphone, both muxed into FLV for `rtmpsink`.

use super::encoders::{AudioEncoder, VideoEncoder};
use crate::config::VideoSettings;

/// Name of the colour-balance element effects are applied to
pub const BALANCE_ELEMENT: &str = "fx_balance";
/// Name of the optional blur element
pub const BLUR_ELEMENT: &str = "fx_blur";
/// Name of the local preview sink
pub const PREVIEW_SINK: &str = "preview_sink";

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// Let GStreamer pick the default camera
    Auto,
    /// A specific V4L2 device node
    Device(String),
}

impl CameraSource {
    fn launch_fragment(&self) -> String {
        match self {
            CameraSource::Auto => "autovideosrc".to_string(),
            CameraSource::Device(path) => format!("v4l2src device={}", quote(path)),
        }
    }
}

/// Encoders and destination for the outgoing stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBranch {
    pub url: String,
    pub video_encoder: VideoEncoder,
    pub video_bitrate_kbps: u32,
    /// `None` streams video only
    pub audio: Option<(AudioEncoder, u32)>,
}

/// Everything needed to render one launch description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescription {
    pub source: CameraSource,
    pub video: VideoSettings,
    /// Include the `gaussianblur` stage
    pub blur: bool,
    pub stream: Option<StreamBranch>,
}

impl PipelineDescription {
    pub fn preview(source: CameraSource, video: VideoSettings, blur: bool) -> Self {
        Self {
            source,
            video,
            blur,
            stream: None,
        }
    }

    pub fn with_stream(mut self, stream: StreamBranch) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Render as `gst-launch` syntax
    pub fn render(&self) -> String {
        let VideoSettings {
            width,
            height,
            framerate,
        } = self.video;

        let mut parts = vec![format!(
            "{} ! videoconvert ! videoscale ! videorate ! \
             video/x-raw,width={},height={},framerate={}/1 ! \
             videobalance name={}",
            self.source.launch_fragment(),
            width,
            height,
            framerate,
            BALANCE_ELEMENT
        )];
        if self.blur {
            parts.push(format!("gaussianblur name={} sigma=0", BLUR_ELEMENT));
        }
        parts.push("videoconvert ! tee name=fx_tee".to_string());
        let mut description = parts.join(" ! ");

        description.push_str(&format!(
            " fx_tee. ! queue leaky=downstream max-size-buffers=2 ! videoconvert ! \
             autovideosink name={} sync=false",
            PREVIEW_SINK
        ));

        if let Some(stream) = &self.stream {
            description.push_str(&format!(
                " fx_tee. ! queue ! videoconvert ! video/x-raw,format=I420 ! {} ! \
                 h264parse ! queue ! mux. \
                 flvmux name=mux streamable=true ! rtmpsink name=rtmp_sink location={}",
                stream
                    .video_encoder
                    .launch_fragment(stream.video_bitrate_kbps, framerate),
                quote(&format!("{} live=1", stream.url))
            ));
            if let Some((encoder, kbps)) = stream.audio {
                description.push_str(&format!(
                    " autoaudiosrc ! audioconvert ! audioresample ! {} ! aacparse ! queue ! mux.",
                    encoder.launch_fragment(kbps)
                ));
            }
        }

        description
    }
}

/// Quote a property value for launch syntax
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview() -> PipelineDescription {
        PipelineDescription::preview(CameraSource::Auto, VideoSettings::default(), true)
    }

    #[test]
    fn test_preview_has_named_effect_stage() {
        let description = preview().render();
        assert!(description.starts_with("autovideosrc ! "));
        assert!(description.contains("width=1280,height=720,framerate=30/1"));
        assert!(description.contains("videobalance name=fx_balance"));
        assert!(description.contains("gaussianblur name=fx_blur"));
        assert!(description.contains("autovideosink name=preview_sink"));
        assert!(!description.contains("rtmpsink"));
    }

    #[test]
    fn test_preview_without_blur_plugin() {
        let mut description = preview();
        description.blur = false;
        assert!(!description.render().contains("gaussianblur"));
    }

    #[test]
    fn test_device_path_is_quoted() {
        let description = PipelineDescription::preview(
            CameraSource::Device("/dev/video2".into()),
            VideoSettings::default(),
            false,
        )
        .render();
        assert!(description.starts_with("v4l2src device=\"/dev/video2\" ! "));
    }

    #[test]
    fn test_stream_branch() {
        let description = preview()
            .with_stream(StreamBranch {
                url: "rtmp://host/live/key".into(),
                video_encoder: VideoEncoder::X264,
                video_bitrate_kbps: 2500,
                audio: Some((AudioEncoder::AvencAac, 128)),
            })
            .render();
        assert!(description.contains("autovideosink name=preview_sink"));
        assert!(description.contains("x264enc"));
        assert!(description.contains("flvmux name=mux streamable=true"));
        assert!(description.contains("location=\"rtmp://host/live/key live=1\""));
        assert!(description.contains("avenc_aac bitrate=128000 ! aacparse"));
    }

    #[test]
    fn test_video_only_stream() {
        let description = preview()
            .with_stream(StreamBranch {
                url: "rtmp://host/live/key".into(),
                video_encoder: VideoEncoder::OpenH264,
                video_bitrate_kbps: 1200,
                audio: None,
            })
            .render();
        assert!(description.contains("openh264enc"));
        assert!(!description.contains("autoaudiosrc"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
