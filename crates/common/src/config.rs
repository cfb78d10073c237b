//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where finished recordings are written.
    pub output_dir: PathBuf,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Default webcam overlay layout.
    pub overlay: OverlayDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Quality preset name (`low`, `medium`, `high`).
    pub quality: String,

    /// Whether to capture the microphone by default.
    pub audio: bool,

    /// Encoder flush interval in milliseconds.
    pub timeslice_ms: u64,

    /// Countdown before capture begins, in seconds.
    pub countdown_secs: u32,
}

/// Default webcam overlay layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayDefaults {
    /// Corner name (`top-left`, `top-right`, `bottom-left`, `bottom-right`).
    pub corner: String,

    /// Overlay width as a fraction of the output width.
    pub size_fraction: f64,

    /// Shape name (`rectangle`, `rounded`, `circle`).
    pub shape: String,

    /// Corner radius for the rounded shape, in output pixels.
    pub corner_radius: f64,

    /// Distance from the canvas edges, in output pixels.
    pub padding: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipmix=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            recording: RecordingDefaults::default(),
            overlay: OverlayDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            quality: "medium".to_string(),
            audio: true,
            timeslice_ms: 1000,
            countdown_secs: 3,
        }
    }
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            corner: "bottom-right".to_string(),
            size_fraction: 0.2,
            shape: "rounded".to_string(),
            corner_radius: 12.0,
            padding: 20.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipmix").join("config.json")
}

/// Default recordings directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("clipmix").join("recordings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_missing_sections() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "recording": { "quality": "high" } }"#).unwrap();
        assert_eq!(config.recording.quality, "high");
        assert_eq!(config.recording.timeslice_ms, 1000);
        assert_eq!(config.overlay.corner, "bottom-right");
        assert!((config.overlay.size_fraction - 0.2).abs() < 1e-9);
        assert_eq!(config.logging.level, "info");
    }
}
