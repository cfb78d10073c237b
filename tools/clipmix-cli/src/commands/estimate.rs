//! Estimate the data rate of one preset.

use clipmix_media_model::{estimate_size, format_bytes, QualityPreset};

pub fn run(quality: QualityPreset, audio: bool) -> anyhow::Result<()> {
    let config = quality.config();
    let estimate = estimate_size(&config, audio);

    println!("Quality: {} ({})", quality, quality.label());
    println!("  Video: {:.0} kbps", estimate.video_kbps);
    if audio {
        println!("  Audio: {:.0} kbps", estimate.audio_kbps);
    }
    println!("  Total: {:.0} kbps", estimate.total_kbps());
    println!("  Per minute: {}", format_bytes(estimate.bytes_per_minute()));
    println!("  Per hour: {}", format_bytes(estimate.bytes_per_minute() * 60.0));
    Ok(())
}
