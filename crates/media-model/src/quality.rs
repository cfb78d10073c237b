//! Recording quality presets and output size estimation.

use std::fmt;
use std::str::FromStr;

use clipmix_common::error::ClipmixError;
use serde::{Deserialize, Serialize};

/// Named quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

/// Concrete encoding targets for a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityConfig {
    pub preset: QualityPreset,
    /// Maximum output width in pixels.
    pub width: u32,
    /// Maximum output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub frame_rate: u32,
    /// Audio bitrate in bits per second.
    pub audio_bitrate: u32,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Short label used by pickers, e.g. `1080p · 30fps`.
    pub fn label(self) -> String {
        let config = self.config();
        format!("{}p · {}fps", config.height, config.frame_rate)
    }

    pub fn config(self) -> QualityConfig {
        match self {
            Self::Low => QualityConfig {
                preset: self,
                width: 1280,
                height: 720,
                frame_rate: 15,
                audio_bitrate: 64_000,
            },
            Self::Medium => QualityConfig {
                preset: self,
                width: 1920,
                height: 1080,
                frame_rate: 30,
                audio_bitrate: 128_000,
            },
            Self::High => QualityConfig {
                preset: self,
                width: 1920,
                height: 1080,
                frame_rate: 60,
                audio_bitrate: 192_000,
            },
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityPreset {
    type Err = ClipmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ClipmixError::config(format!(
                "Unknown quality preset '{other}' (expected low, medium, or high)"
            ))),
        }
    }
}

impl QualityConfig {
    /// Video bitrate the encoder should target for this configuration.
    pub fn video_bitrate_kbps(&self) -> u32 {
        video_bitrate_kbps(self.width, self.height, self.frame_rate)
    }
}

/// Empirical VP9 bitrates keyed by resolution and frame-rate tier.
///
/// Configurations outside the table fall back to roughly 0.1 bits per pixel.
pub fn video_bitrate_kbps(width: u32, height: u32, frame_rate: u32) -> u32 {
    if width <= 1280 && height <= 720 && frame_rate <= 15 {
        return 800;
    }
    if width <= 1920 && height <= 1080 && frame_rate <= 30 {
        return 2500;
    }
    if width <= 1920 && height <= 1080 && frame_rate <= 60 {
        return 5000;
    }

    let pixels_per_second = width as f64 * height as f64 * frame_rate as f64;
    (pixels_per_second * 0.1 / 1000.0).round() as u32
}

/// Expected data rate of a recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeEstimate {
    pub video_kbps: f64,
    pub audio_kbps: f64,
}

impl SizeEstimate {
    pub fn total_kbps(&self) -> f64 {
        self.video_kbps + self.audio_kbps
    }

    /// kbps * 60 seconds * 1000 bits/kilobit / 8 bits/byte.
    pub fn bytes_per_minute(&self) -> f64 {
        self.total_kbps() * 60.0 * 1000.0 / 8.0
    }
}

impl fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}/min", format_bytes(self.bytes_per_minute()))
    }
}

/// Estimate the data rate for a quality configuration.
pub fn estimate_size(config: &QualityConfig, has_audio: bool) -> SizeEstimate {
    let audio_kbps = if has_audio {
        config.audio_bitrate as f64 / 1000.0
    } else {
        0.0
    };
    SizeEstimate {
        video_kbps: config.video_bitrate_kbps() as f64,
        audio_kbps,
    }
}

/// Format a byte count with the most readable unit (B, KB, or MB).
pub fn format_bytes(bytes: f64) -> String {
    if bytes < 1024.0 {
        format!("{bytes:.0} B")
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_published_tiers() {
        let low = QualityPreset::Low.config();
        assert_eq!((low.width, low.height, low.frame_rate), (1280, 720, 15));
        assert_eq!(low.audio_bitrate, 64_000);

        let medium = QualityPreset::Medium.config();
        assert_eq!(
            (medium.width, medium.height, medium.frame_rate),
            (1920, 1080, 30)
        );
        assert_eq!(medium.audio_bitrate, 128_000);

        let high = QualityPreset::High.config();
        assert_eq!((high.width, high.height, high.frame_rate), (1920, 1080, 60));
        assert_eq!(high.audio_bitrate, 192_000);
    }

    #[test]
    fn preset_names_round_trip_through_from_str() {
        for preset in QualityPreset::ALL {
            assert_eq!(preset.name().parse::<QualityPreset>().unwrap(), preset);
        }
        assert!("ultra".parse::<QualityPreset>().is_err());
        assert_eq!(QualityPreset::High.label(), "1080p · 60fps");
    }

    #[test]
    fn medium_with_audio_estimate() {
        let estimate = estimate_size(&QualityPreset::Medium.config(), true);
        assert_eq!(estimate.video_kbps, 2500.0);
        assert_eq!(estimate.audio_kbps, 128.0);
        let expected = (2500.0 + 128.0) * 60.0 * 1000.0 / 8.0;
        assert!((estimate.bytes_per_minute() - expected).abs() < 1e-6);
        assert_eq!(estimate.to_string(), "~18.8 MB/min");
    }

    #[test]
    fn audio_is_excluded_when_disabled() {
        let estimate = estimate_size(&QualityPreset::Low.config(), false);
        assert_eq!(estimate.total_kbps(), 800.0);
        assert_eq!(estimate.to_string(), "~5.7 MB/min");
    }

    #[test]
    fn bitrate_table_and_fallback() {
        assert_eq!(video_bitrate_kbps(1920, 1080, 60), 5000);
        assert_eq!(video_bitrate_kbps(1280, 720, 30), 2500);
        // 4K30 falls outside the table: 3840*2160*30*0.1/1000
        assert_eq!(video_bitrate_kbps(3840, 2160, 30), 24883);
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(2048.0), "2.0 KB");
        assert_eq!(format_bytes(3.5 * 1024.0 * 1024.0), "3.5 MB");
    }

    proptest::proptest! {
        #[test]
        fn audio_never_shrinks_the_estimate(
            width in 2u32..7680,
            height in 2u32..4320,
            fps in 1u32..120,
            audio_bitrate in 0u32..512_000,
        ) {
            let config = QualityConfig {
                preset: QualityPreset::Medium,
                width,
                height,
                frame_rate: fps,
                audio_bitrate,
            };
            let with_audio = estimate_size(&config, true);
            let without = estimate_size(&config, false);
            proptest::prop_assert!(with_audio.bytes_per_minute() >= without.bytes_per_minute());
            proptest::prop_assert_eq!(with_audio.video_kbps, without.video_kbps);
        }
    }
}
