//! Record synthetic feeds through the full pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clipmix_capture_engine::synthetic::SyntheticBackend;
use clipmix_capture_engine::{EncoderBackend, RecordingSession, StartOptions};
use clipmix_common::AppConfig;
use clipmix_media_model::{CompositorConfig, QualityConfig, QualityPreset};
use clipmix_platform_core::{CameraRequest, CaptureBackend, DisplayRequest, FrameSize, VideoFeed};
use clipmix_render_engine::Compositor;

use super::{compositor_config, print_summary, resolve_quality, save_recording, OverlayArgs};

pub struct DemoArgs {
    pub seconds: u64,
    pub webcam: bool,
    pub audio: bool,
    pub quality: Option<QualityPreset>,
    pub overlay: OverlayArgs,
    pub snapshot: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[cfg(feature = "gstreamer")]
fn encoder_backend() -> anyhow::Result<Arc<dyn EncoderBackend>> {
    Ok(Arc::new(clipmix_capture_engine::GstEncoderBackend::new()?))
}

#[cfg(not(feature = "gstreamer"))]
fn encoder_backend() -> anyhow::Result<Arc<dyn EncoderBackend>> {
    Ok(Arc::new(clipmix_capture_engine::MjpegEncoderBackend::default()))
}

pub async fn run(config: &AppConfig, args: DemoArgs) -> anyhow::Result<()> {
    let quality = resolve_quality(config, args.quality)?;
    let quality_config = quality.config();
    let compositor = compositor_config(config, &args.overlay)?;
    let encoders = encoder_backend()?;

    let screen = FrameSize::new(quality_config.width, quality_config.height);
    let backend = Arc::new(SyntheticBackend::new(screen).animated());
    let session = RecordingSession::new(backend.clone(), encoders.clone(), compositor.clone())
        .with_timeslice(Duration::from_millis(config.recording.timeslice_ms));

    println!("Starting demo recording");
    println!("  Quality: {} ({})", quality, quality.label());
    println!("  Encoder: {}", encoders.name());
    println!("  Webcam: {}", args.webcam);
    println!("  Audio: {}", args.audio);
    println!();

    let webcam = if args.webcam {
        Some(backend.acquire_camera(&CameraRequest::default()).await?)
    } else {
        None
    };

    let started = session
        .start(StartOptions {
            audio: args.audio,
            webcam: webcam.clone(),
            quality,
        })
        .await;
    if let Err(e) = started {
        release(webcam.as_deref());
        return Err(anyhow::anyhow!("Failed to start recording: {}", e.user_message()));
    }

    println!("Recording for {}s (Ctrl+C to stop early)...", args.seconds);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
    }
    session.stop().await;

    let recording = session.take_recording().ok_or_else(|| {
        anyhow::anyhow!(
            "Recording failed: {}",
            session.last_error().unwrap_or_else(|| "no data was produced".to_string())
        )
    });

    if let Some(path) = &args.snapshot {
        let saved = save_snapshot(&backend, webcam.clone(), compositor, &quality_config, path).await;
        if let Err(e) = saved {
            tracing::warn!(error = %e, "Failed to save snapshot");
        } else {
            println!("Snapshot saved to: {}", path.display());
        }
    }
    release(webcam.as_deref());

    let recording = recording?;
    let dir = args.output.unwrap_or_else(|| config.output_dir.clone());
    let path = save_recording(&dir, &recording)?;
    println!();
    print_summary(&path, &recording);
    Ok(())
}

fn release(webcam: Option<&dyn VideoFeed>) {
    if let Some(webcam) = webcam {
        webcam.stop();
    }
}

/// Composite one frame from fresh synthetic feeds and write it as PNG.
async fn save_snapshot(
    backend: &SyntheticBackend,
    webcam: Option<Arc<dyn VideoFeed>>,
    config: CompositorConfig,
    quality: &QualityConfig,
    path: &Path,
) -> anyhow::Result<()> {
    let screen = backend
        .acquire_display(&DisplayRequest {
            frame_rate: quality.frame_rate,
            ..DisplayRequest::default()
        })
        .await?;

    let mut compositor = Compositor::new(config.with_quality(quality));
    let mut sink = compositor.start(screen.clone(), webcam).await?;
    let frame = sink.next_frame().await;
    compositor.stop().await;
    screen.stop();

    let frame = frame.context("Compositor produced no frame")?;
    frame
        .image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
