// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Destination shown in the URL field of a fresh session
pub const DEFAULT_STREAM_URL: &str = "rtmp://192.168.0.140:1935/live/test";

/// `last_error` text used when the server rejects credentials
pub const AUTH_FAILED_REASON: &str = "authentication error";

/// `last_error` text used when the camera backend drops the preview on its own
pub const PREVIEW_LOST_REASON: &str = "preview lost";

/// Live-stream encoder bitrate presets
///
/// Live ingest servers usually cap the accepted bitrate well below what a
/// local recording would use, so these sit lower than file-recording values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - survives weak uplinks
    Low,
    /// Medium bitrate - balanced quality and bandwidth (default)
    #[default]
    Medium,
    /// High bitrate - best quality, needs a solid uplink
    High,
}

impl BitratePreset {
    /// Get all preset variants for UI iteration
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Video bitrate in kbps for a given output width
    ///
    /// - SD (640x480): Low=0.8, Medium=1.2, High=2 Mbps
    /// - HD (1280x720): Low=1.5, Medium=2.5, High=4 Mbps
    /// - Full HD (1920x1080): Low=3, Medium=4.5, High=6 Mbps
    /// - 2K and above: Low=6, Medium=9, High=12 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        self.bitrate_for_tier(get_resolution_tier(width))
    }

    /// Get the bitrate for a specific resolution tier
    pub fn bitrate_for_tier(&self, tier: ResolutionTier) -> u32 {
        match (tier, self) {
            (ResolutionTier::SD, BitratePreset::Low) => 800,
            (ResolutionTier::SD, BitratePreset::Medium) => 1_200,
            (ResolutionTier::SD, BitratePreset::High) => 2_000,
            (ResolutionTier::HD, BitratePreset::Low) => 1_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 2_500,
            (ResolutionTier::HD, BitratePreset::High) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 3_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 4_500,
            (ResolutionTier::FullHD, BitratePreset::High) => 6_000,
            (ResolutionTier::TwoKPlus, BitratePreset::Low) => 6_000,
            (ResolutionTier::TwoKPlus, BitratePreset::Medium) => 9_000,
            (ResolutionTier::TwoKPlus, BitratePreset::High) => 12_000,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: below 1280 wide
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080
    FullHD,
    /// 2560x1440 and above
    TwoKPlus,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 2560 => ResolutionTier::TwoKPlus,
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Format bitrate for display (e.g., "4 Mbps" or "2.5 Mbps")
pub fn format_bitrate(kbps: u32) -> String {
    let mbps = kbps as f64 / 1000.0;
    if mbps == mbps.floor() {
        format!("{} Mbps", mbps as u32)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Terminal UI input poll interval
    pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Bus poll interval for the stream watch thread
    pub const BUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// How long to wait for a pipeline state change before giving up
    pub const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        assert_eq!(get_resolution_tier(640), ResolutionTier::SD);
        assert_eq!(get_resolution_tier(1280), ResolutionTier::HD);
        assert_eq!(get_resolution_tier(1920), ResolutionTier::FullHD);
        assert_eq!(get_resolution_tier(3840), ResolutionTier::TwoKPlus);
    }

    #[test]
    fn test_format_bitrate() {
        assert_eq!(format_bitrate(4_000), "4 Mbps");
        assert_eq!(format_bitrate(2_500), "2.5 Mbps");
    }
}
