//! List the quality presets.

use clipmix_media_model::{estimate_size, format_bytes, QualityPreset};

const PRESETS: [QualityPreset; 3] = [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High];

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        let configs: Vec<_> = PRESETS.iter().map(|p| p.config()).collect();
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    println!("{:<8} {:<16} {:>10} {:>14}", "Preset", "Output", "Video", "With audio");
    println!("{}", "=".repeat(52));
    for preset in PRESETS {
        let config = preset.config();
        let estimate = estimate_size(&config, true);
        println!(
            "{:<8} {:<16} {:>6} kbps {:>10}/min",
            preset.name(),
            format!("{}x{} @ {}fps", config.width, config.height, config.frame_rate),
            config.video_bitrate_kbps(),
            format_bytes(estimate.bytes_per_minute()),
        );
    }
    Ok(())
}
