//! Record the screen with the GStreamer capture backend.

use std::path::PathBuf;

use clipmix_common::AppConfig;
use clipmix_media_model::QualityPreset;

use super::OverlayArgs;

#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub struct RecordArgs {
    pub quality: Option<QualityPreset>,
    pub mic: bool,
    pub webcam: bool,
    pub source: Option<String>,
    pub countdown: Option<u32>,
    pub overlay: OverlayArgs,
    pub output: Option<PathBuf>,
}

#[cfg(not(feature = "gstreamer"))]
pub async fn run(_config: &AppConfig, _args: RecordArgs) -> anyhow::Result<()> {
    anyhow::bail!(
        "clipmix was built without screen capture support; rebuild with `--features gstreamer` or try `clipmix demo`"
    )
}

#[cfg(feature = "gstreamer")]
pub async fn run(config: &AppConfig, args: RecordArgs) -> anyhow::Result<()> {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use clipmix_capture_engine::{GstCaptureBackend, GstEncoderBackend, RecordingSession, StartOptions};
    use clipmix_common::format_elapsed;
    use clipmix_platform_core::{CameraRequest, CaptureBackend};

    use super::{compositor_config, print_summary, resolve_quality, save_recording};

    let quality = resolve_quality(config, args.quality)?;
    let compositor = compositor_config(config, &args.overlay)?;
    let backend = Arc::new(GstCaptureBackend::new()?);
    let encoders = Arc::new(GstEncoderBackend::new()?);
    let session = RecordingSession::new(backend.clone(), encoders, compositor)
        .with_timeslice(Duration::from_millis(config.recording.timeslice_ms));
    session.select_source(args.source.clone());

    println!("Starting recording");
    println!("  Source: {}", args.source.as_deref().unwrap_or("default screen"));
    println!("  Quality: {} ({})", quality, quality.label());
    println!("  Mic: {}", args.mic);
    println!("  Webcam: {}", args.webcam);
    println!();

    let webcam = if args.webcam {
        Some(backend.acquire_camera(&CameraRequest::default()).await?)
    } else {
        None
    };
    let release_webcam = || {
        if let Some(webcam) = &webcam {
            webcam.stop();
        }
    };

    let countdown = args.countdown.unwrap_or(config.recording.countdown_secs);
    for remaining in (1..=countdown).rev() {
        println!("Recording in {remaining}...");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Countdown cancelled");
                release_webcam();
                return Ok(());
            }
        }
    }

    let started = session
        .start(StartOptions {
            audio: args.mic,
            webcam: webcam.clone(),
            quality,
        })
        .await;
    if let Err(e) = started {
        release_webcam();
        anyhow::bail!("Failed to start recording: {}", e.user_message());
    }

    println!("Recording. Press Ctrl+C to stop...");
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = session.wait_finished() => {
                println!();
                println!("Screen sharing ended");
                break;
            }
            _ = ticker.tick() => {
                print!("\r  {}", format_elapsed(session.elapsed_secs() as u64));
                let _ = std::io::stdout().flush();
            }
        }
    }
    println!();

    session.stop().await;
    release_webcam();

    let recording = session.take_recording().ok_or_else(|| {
        anyhow::anyhow!(
            "Recording failed: {}",
            session.last_error().unwrap_or_else(|| "no data was produced".to_string())
        )
    })?;
    let dir = args.output.unwrap_or_else(|| config.output_dir.clone());
    let path = save_recording(&dir, &recording)?;
    print_summary(&path, &recording);
    Ok(())
}
