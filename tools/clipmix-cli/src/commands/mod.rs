pub mod config;
pub mod demo;
pub mod estimate;
pub mod presets;
pub mod record;
pub mod sources;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clipmix_common::AppConfig;
use clipmix_media_model::{
    CompositorConfig, FinishedRecording, OverlayCorner, OverlayShape, QualityPreset,
};

/// Overlay overrides shared by `demo` and `record`.
pub struct OverlayArgs {
    pub shape: Option<OverlayShape>,
    pub corner: Option<OverlayCorner>,
}

/// Preset from the command line, else from the config file.
pub fn resolve_quality(config: &AppConfig, quality: Option<QualityPreset>) -> anyhow::Result<QualityPreset> {
    match quality {
        Some(q) => Ok(q),
        None => config
            .recording
            .quality
            .parse()
            .context("Invalid quality preset in config file"),
    }
}

/// Compositor layout from the config file with command-line overrides.
pub fn compositor_config(config: &AppConfig, overlay: &OverlayArgs) -> anyhow::Result<CompositorConfig> {
    let defaults = &config.overlay;
    let corner = match overlay.corner {
        Some(c) => c,
        None => defaults.corner.parse().context("Invalid overlay corner in config file")?,
    };
    let shape = match overlay.shape {
        Some(s) => s,
        None => defaults.shape.parse().context("Invalid overlay shape in config file")?,
    };

    let compositor = CompositorConfig {
        corner,
        shape,
        size_fraction: defaults.size_fraction,
        corner_radius: defaults.corner_radius,
        padding: defaults.padding,
        ..CompositorConfig::default()
    };
    compositor.validate()?;
    Ok(compositor)
}

/// Write a finished recording under `dir` using its suggested file name.
pub fn save_recording(dir: &Path, recording: &FinishedRecording) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(recording.suggested_file_name());
    std::fs::write(&path, &recording.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn print_summary(path: &Path, recording: &FinishedRecording) {
    println!("Recording saved to: {}", path.display());
    println!("  Format: {}", recording.mime_type);
    println!("  Duration: {:.1}s", recording.duration_secs());
    println!(
        "  Size: {} ({} chunks)",
        clipmix_media_model::format_bytes(recording.len() as f64),
        recording.chunk_count
    );
    if recording.truncated {
        println!("  Warning: the encoder failed; the file may be incomplete");
    }
}
