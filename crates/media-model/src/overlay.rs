//! Webcam overlay layout and compositor configuration.

use std::fmt;
use std::str::FromStr;

use clipmix_common::error::{ClipmixError, ClipmixResult};
use serde::{Deserialize, Serialize};

use crate::quality::QualityConfig;

/// Canvas corner the overlay is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Clip shape applied to the overlay before the webcam frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayShape {
    Rectangle,
    #[default]
    Rounded,
    /// Largest circle inscribed in the overlay box.
    Circle,
}

impl OverlayCorner {
    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    pub fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }

    pub fn is_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight)
    }
}

impl OverlayShape {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Rounded => "rounded",
            Self::Circle => "circle",
        }
    }
}

impl fmt::Display for OverlayCorner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for OverlayShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverlayCorner {
    type Err = ClipmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(ClipmixError::config(format!(
                "Unknown overlay corner '{other}'"
            ))),
        }
    }
}

impl FromStr for OverlayShape {
    type Err = ClipmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "rectangle" | "rect" => Ok(Self::Rectangle),
            "rounded" | "rounded-rectangle" => Ok(Self::Rounded),
            "circle" => Ok(Self::Circle),
            other => Err(ClipmixError::config(format!(
                "Unknown overlay shape '{other}'"
            ))),
        }
    }
}

/// Layout and pacing for one compositing run.
///
/// Fixed for the lifetime of a recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub corner: OverlayCorner,

    /// Overlay width as a fraction of the canvas width.
    pub size_fraction: f64,

    pub shape: OverlayShape,

    /// Corner radius for [`OverlayShape::Rounded`], in canvas pixels.
    pub corner_radius: f64,

    /// Inset from the canvas edges, in canvas pixels.
    pub padding: f64,

    /// Output frame rate.
    pub frame_rate: u32,

    pub max_width: Option<u32>,
    pub max_height: Option<u32>,

    /// RGBA fill for letterbox bars and not-yet-ready ticks.
    pub background: [u8; 4],
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            corner: OverlayCorner::BottomRight,
            size_fraction: 0.2,
            shape: OverlayShape::Rounded,
            corner_radius: 12.0,
            padding: 20.0,
            frame_rate: 30,
            max_width: None,
            max_height: None,
            background: [0, 0, 0, 255],
        }
    }
}

impl CompositorConfig {
    /// Bound the output size and tick rate by a quality preset.
    pub fn with_quality(mut self, quality: &QualityConfig) -> Self {
        self.frame_rate = quality.frame_rate;
        self.max_width = Some(quality.width);
        self.max_height = Some(quality.height);
        self
    }

    pub fn validate(&self) -> ClipmixResult<()> {
        if self.frame_rate == 0 {
            return Err(ClipmixError::config("Compositor frame rate must be positive"));
        }
        if !(self.size_fraction > 0.0 && self.size_fraction <= 1.0) {
            return Err(ClipmixError::config(format!(
                "Overlay size fraction must be in (0, 1], got {}",
                self.size_fraction
            )));
        }
        if self.padding < 0.0 || self.corner_radius < 0.0 {
            return Err(ClipmixError::config(
                "Overlay padding and corner radius must not be negative",
            ));
        }
        if matches!(self.max_width, Some(w) if w < 2) || matches!(self.max_height, Some(h) if h < 2)
        {
            return Err(ClipmixError::config(
                "Maximum output size must be at least 2x2",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityPreset;

    #[test]
    fn defaults_follow_desktop_layout() {
        let config = CompositorConfig::default();
        assert_eq!(config.corner, OverlayCorner::BottomRight);
        assert_eq!(config.shape, OverlayShape::Rounded);
        assert!((config.size_fraction - 0.2).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn quality_bounds_output() {
        let config = CompositorConfig::default().with_quality(&QualityPreset::Low.config());
        assert_eq!(config.frame_rate, 15);
        assert_eq!(config.max_width, Some(1280));
        assert_eq!(config.max_height, Some(720));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = CompositorConfig::default();
        config.size_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = CompositorConfig::default();
        config.frame_rate = 0;
        assert!(config.validate().is_err());

        let mut config = CompositorConfig::default();
        config.max_height = Some(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn names_parse_back() {
        assert_eq!(
            "bottom_left".parse::<OverlayCorner>().unwrap(),
            OverlayCorner::BottomLeft
        );
        assert_eq!(
            "rounded-rectangle".parse::<OverlayShape>().unwrap(),
            OverlayShape::Rounded
        );
        assert!("middle".parse::<OverlayCorner>().is_err());
        let json = serde_json::to_string(&OverlayCorner::TopRight).unwrap();
        assert_eq!(json, "\"top-right\"");
    }
}
