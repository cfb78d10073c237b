use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clipmix_capture_engine::synthetic::{FailureMode, SyntheticBackend, SyntheticEncoderBackend};
use clipmix_capture_engine::{
    MjpegEncoderBackend, RecordingSession, StartOptions, MIME_MJPEG, MIME_VP9, MIME_VP9_OPUS,
};
use clipmix_common::ClipmixError;
use clipmix_media_model::{CompositorConfig, QualityPreset, SessionState};
use clipmix_platform_core::{CameraRequest, CaptureBackend, FrameSize, VideoFeed};

struct Harness {
    backend: Arc<SyntheticBackend>,
    encoders: Arc<SyntheticEncoderBackend>,
    session: RecordingSession,
}

fn harness_with(screen: FrameSize, encoders: SyntheticEncoderBackend) -> Harness {
    let backend = Arc::new(SyntheticBackend::new(screen));
    let encoders = Arc::new(encoders);
    let session = RecordingSession::new(
        backend.clone(),
        encoders.clone(),
        CompositorConfig::default(),
    );
    Harness {
        backend,
        encoders,
        session,
    }
}

fn harness() -> Harness {
    harness_with(FrameSize::new(640, 360), SyntheticEncoderBackend::default())
}

fn video_only() -> StartOptions {
    StartOptions {
        audio: false,
        ..StartOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn idle_session_ignores_pause_resume_and_stop() {
    let h = harness();

    assert!(!h.session.pause());
    assert!(!h.session.resume());
    h.session.stop().await;

    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.take_recording().is_none());
    assert!(h.backend.displays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_produces_one_recording() {
    let h = harness();

    h.session.start(StartOptions::default()).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Recording);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(h.session.pause());
    assert!(!h.session.pause());
    assert_eq!(h.session.state(), SessionState::Paused);

    let frames_at_pause = h.encoders.counters().video_frames.load(Ordering::Acquire);
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(
        h.encoders.counters().video_frames.load(Ordering::Acquire),
        frames_at_pause,
        "no frames reach the encoder while paused"
    );

    assert!(h.session.resume());
    assert!(!h.session.resume());
    tokio::time::sleep(Duration::from_millis(600)).await;

    h.session.stop().await;
    assert_eq!(h.session.state(), SessionState::Stopped);

    let recording = h.session.take_recording().expect("finished recording");
    assert_eq!(recording.mime_type, MIME_VP9_OPUS);
    assert!(recording.has_audio_codec());
    assert!(!recording.truncated);
    assert!(recording.bytes.starts_with(b"HDR"));
    assert!(recording.bytes.ends_with(b"END"));
    assert!(
        (1800..=2400).contains(&recording.duration_ms),
        "paused span excluded, got {}ms",
        recording.duration_ms
    );
    assert!(h.session.take_recording().is_none());
}

#[tokio::test(start_paused = true)]
async fn stopping_twice_releases_devices_exactly_once() {
    let h = harness();

    h.session.start(StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.session.stop().await;
    h.session.stop().await;

    assert_eq!(h.session.state(), SessionState::Stopped);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);
    assert_eq!(h.encoders.counters().finishes.load(Ordering::Acquire), 1);
    assert!(h.session.take_recording().is_some());
}

#[tokio::test(start_paused = true)]
async fn video_only_recording_does_not_advertise_audio() {
    let h = harness();

    h.session.start(video_only()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.session.stop().await;

    assert!(h.backend.microphones().is_empty());
    let opened = h.encoders.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].mime_type, MIME_VP9);
    assert!(opened[0].audio.is_none());

    let recording = h.session.take_recording().unwrap();
    assert!(!recording.has_audio_codec());
}

#[tokio::test(start_paused = true)]
async fn microphone_failure_is_not_fatal() {
    let h = harness();
    h.backend.fail_microphone(Some(FailureMode::PermissionDenied));

    h.session.start(StartOptions::default()).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Recording);
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.session.stop().await;

    let recording = h.session.take_recording().unwrap();
    assert_eq!(recording.mime_type, MIME_VP9);
    assert!(h.session.last_error().is_none());
    assert_eq!(h.encoders.counters().audio_blocks.load(Ordering::Acquire), 0);
}

#[tokio::test(start_paused = true)]
async fn display_denial_returns_to_idle_with_error() {
    let h = harness();
    h.backend.fail_display(Some(FailureMode::PermissionDenied));

    let err = h.session.start(StartOptions::default()).await.unwrap_err();
    assert!(matches!(err, ClipmixError::PermissionDenied { .. }));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.last_error().is_some());
    assert!(h.backend.microphones().is_empty());
    assert!(h.encoders.opened().is_empty());

    // The failure is not sticky.
    h.backend.fail_display(None);
    h.session.start(video_only()).await.unwrap();
    assert!(h.session.last_error().is_none());
    h.session.stop().await;
    assert_eq!(h.session.state(), SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn unsupported_encoder_releases_everything_acquired() {
    let h = harness_with(
        FrameSize::new(640, 360),
        SyntheticEncoderBackend::supporting(&[]),
    );

    let err = h.session.start(StartOptions::default()).await.unwrap_err();
    assert!(matches!(err, ClipmixError::Unsupported { .. }));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn screen_track_end_stops_recording() {
    let h = harness();

    h.session.start(StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.backend.displays()[0].end();

    assert_eq!(h.session.wait_finished().await, SessionState::Stopped);
    let recording = h.session.take_recording().expect("recording kept after track end");
    assert!(!recording.is_empty());
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);

    // A later stop has nothing left to do.
    h.session.stop().await;
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn webcam_recording_goes_through_compositor() {
    let h = harness();
    let camera = h
        .backend
        .acquire_camera(&CameraRequest::default())
        .await
        .unwrap();

    h.session
        .start(StartOptions {
            audio: false,
            webcam: Some(camera.clone()),
            quality: QualityPreset::Low,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.session.stop().await;

    let opened = h.encoders.opened();
    assert_eq!((opened[0].width, opened[0].height), (640, 360));
    assert_eq!(opened[0].frame_rate, 15);
    assert!(h.session.take_recording().is_some());

    // The caller owns the webcam.
    assert!(camera.is_live());
    assert_eq!(h.backend.cameras()[0].stop_count(), 0);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_keeps_truncated_output() {
    let h = harness_with(
        FrameSize::new(640, 360),
        SyntheticEncoderBackend::default().failing_after(5),
    );

    h.session.start(video_only()).await.unwrap();
    assert_eq!(h.session.wait_finished().await, SessionState::Stopped);

    let recording = h.session.take_recording().unwrap();
    assert!(recording.truncated);
    assert!(h.session.last_error().is_some());
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn output_is_flushed_about_once_per_second() {
    let h = harness();

    h.session.start(video_only()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let drains = h.encoders.counters().drains.load(Ordering::Acquire);
    assert_eq!(drains, 3);
    h.session.stop().await;

    // Three timed flushes, the flush at stop, and the finish tail.
    let recording = h.session.take_recording().unwrap();
    assert_eq!(recording.chunk_count, 5);
}

#[tokio::test(start_paused = true)]
async fn start_while_recording_is_rejected() {
    let h = harness();

    h.session.start(video_only()).await.unwrap();
    let err = h.session.start(video_only()).await.unwrap_err();
    assert!(matches!(err, ClipmixError::InvalidState { .. }));
    assert_eq!(h.session.state(), SessionState::Recording);
    assert_eq!(h.backend.displays().len(), 1);

    h.session.stop().await;
    h.session.start(video_only()).await.unwrap();
    assert_eq!(h.backend.displays().len(), 2);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.unreleased_displays_at_acquire(), vec![0, 0]);
    h.session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_right_after_track_end_waits_for_release() {
    let h = harness();

    h.session.start(video_only()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.backend.displays()[0].end();

    // The ended session is still finalizing; start waits for it.
    h.session.start(video_only()).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Recording);
    assert_eq!(h.backend.displays().len(), 2);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.unreleased_displays_at_acquire(), vec![0, 0]);

    h.session.stop().await;
    assert_eq!(h.session.state(), SessionState::Stopped);
    assert_eq!(h.backend.displays()[1].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_racing_a_pending_stop_waits_for_release() {
    let h = harness();

    h.session.start(StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let ((), restarted) = tokio::join!(h.session.stop(), h.session.start(video_only()));
    restarted.unwrap();

    assert_eq!(h.session.state(), SessionState::Recording);
    assert_eq!(h.backend.displays()[0].stop_count(), 1);
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);
    assert_eq!(h.backend.unreleased_displays_at_acquire(), vec![0, 0]);

    h.session.stop().await;
    assert_eq!(h.backend.displays()[1].stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn microphone_is_released_when_format_has_no_audio() {
    let h = harness_with(
        FrameSize::new(640, 360),
        SyntheticEncoderBackend::supporting(&[MIME_VP9]),
    );

    h.session.start(StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.session.state(), SessionState::Recording);
    assert_eq!(h.backend.microphones().len(), 1);
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);
    assert_eq!(h.backend.microphones()[0].blocks_taken(), 0);
    assert!(h.encoders.opened()[0].audio.is_none());

    h.session.stop().await;
    assert_eq!(h.backend.microphones()[0].stop_count(), 1);
    assert_eq!(h.session.take_recording().unwrap().mime_type, MIME_VP9);
}

#[tokio::test(start_paused = true)]
async fn motion_jpeg_fallback_releases_the_microphone() {
    let backend = Arc::new(SyntheticBackend::new(FrameSize::new(320, 180)));
    let session = RecordingSession::new(
        backend.clone(),
        Arc::new(MjpegEncoderBackend::default()),
        CompositorConfig::default(),
    );

    session.start(StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.microphones()[0].stop_count(), 1);

    session.stop().await;
    let recording = session.take_recording().unwrap();
    assert_eq!(recording.mime_type, MIME_MJPEG);
    assert!(!recording.has_audio_codec());
}

#[tokio::test(start_paused = true)]
async fn selected_source_and_quality_reach_the_backend() {
    let h = harness_with(
        FrameSize::new(3840, 2160),
        SyntheticEncoderBackend::default(),
    );
    h.session.select_source(Some("window:1".to_string()));

    h.session
        .start(StartOptions {
            audio: false,
            webcam: None,
            quality: QualityPreset::High,
        })
        .await
        .unwrap();
    h.session.stop().await;

    let request = &h.backend.display_requests()[0];
    assert_eq!(request.source_id.as_deref(), Some("window:1"));
    assert_eq!(request.frame_rate, 60);
    let opened = &h.encoders.opened()[0];
    assert_eq!((opened.width, opened.height), (1920, 1080));

    h.session.select_source(Some("window:99".to_string()));
    let err = h.session.start(video_only()).await.unwrap_err();
    assert!(matches!(err, ClipmixError::DeviceNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn webcam_denial_happens_before_the_session_is_involved() {
    let h = harness();
    h.backend.fail_camera(Some(FailureMode::NoDevice));

    let err = h
        .backend
        .acquire_camera(&CameraRequest::default())
        .await
        .err()
        .expect("camera acquisition should fail");
    assert!(err.is_device_error());
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.backend.displays().is_empty());
}
