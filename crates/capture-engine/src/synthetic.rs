//! Synthetic feeds, capture backend, and encoder.
//!
//! Drive the session controller and compositor without devices: in tests,
//! in the `clipmix demo` command, and on machines with nothing to capture.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use clipmix_common::{ClipmixError, ClipmixResult};
use clipmix_platform_core::{
    AudioBlock, AudioFeed, CameraRequest, CaptureBackend, DisplayRequest, EndSignal, FrameSize,
    Source, SourceKind, VideoFeed, VideoFrame, wait_ended,
};
use image::{Rgba, RgbaImage};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::encoder::{
    EncoderBackend, EncoderParams, IncrementalEncoder, MIME_VP9, MIME_VP9_OPUS, MIME_WEBM,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct VideoState {
    frame: Option<Arc<VideoFrame>>,
    native: Option<FrameSize>,
    sequence: u64,
}

/// Video feed whose frames are pushed by the caller.
pub struct SyntheticVideoFeed {
    label: String,
    state: Mutex<VideoState>,
    live: AtomicBool,
    end: EndSignal,
    stops: AtomicUsize,
}

impl SyntheticVideoFeed {
    /// A feed that has not delivered any frame yet.
    pub fn pending(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            state: Mutex::new(VideoState::default()),
            live: AtomicBool::new(true),
            end: EndSignal::new(),
            stops: AtomicUsize::new(0),
        })
    }

    /// A feed already showing a solid frame.
    pub fn solid(label: impl Into<String>, size: FrameSize, rgba: [u8; 4]) -> Arc<Self> {
        let feed = Self::pending(label);
        feed.deliver_frame(RgbaImage::from_pixel(size.width, size.height, Rgba(rgba)));
        feed
    }

    /// Publish a new frame; its size becomes the native size.
    pub fn deliver_frame(&self, image: RgbaImage) {
        let mut state = lock(&self.state);
        let sequence = state.sequence;
        state.sequence += 1;
        state.native = Some(FrameSize::new(image.width(), image.height()));
        state.frame = Some(Arc::new(VideoFrame::new(image, 0, sequence)));
    }

    /// Simulate the platform terminating the track, e.g. the user pressed the
    /// system's "stop sharing" button.
    pub fn end(&self) {
        self.live.store(false, Ordering::Release);
        if self.end.fire() {
            tracing::debug!(feed = %self.label, "Synthetic track ended");
        }
    }

    /// Number of `stop()` calls, including repeated ones.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }

    /// Animate a moving test pattern until the feed ends.
    pub fn spawn_pattern(self: &Arc<Self>, size: FrameSize, fps: u32, base: [u8; 4]) -> JoinHandle<()> {
        let feed = Arc::clone(self);
        tokio::spawn(async move {
            let mut ended = feed.end.subscribe();
            let mut tick = tokio::time::interval(Duration::from_nanos(
                1_000_000_000 / u64::from(fps.max(1)),
            ));
            let mut step = 0u32;
            loop {
                tokio::select! {
                    _ = wait_ended(&mut ended) => break,
                    _ = tick.tick() => {
                        feed.deliver_frame(test_pattern(size, base, step));
                        step = step.wrapping_add(1);
                    }
                }
            }
        })
    }
}

/// Solid background with a bright bar sweeping left to right.
pub fn test_pattern(size: FrameSize, base: [u8; 4], step: u32) -> RgbaImage {
    let bar_width = (size.width / 16).max(1);
    let bar_x = (step.wrapping_mul(bar_width / 2 + 1)) % size.width.max(1);
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        if x >= bar_x && x < bar_x + bar_width {
            Rgba([255, 255, 255, 255])
        } else {
            let shade = ((y * 64) / size.height.max(1)) as u8;
            Rgba([
                base[0].saturating_add(shade),
                base[1].saturating_add(shade),
                base[2].saturating_add(shade),
                255,
            ])
        }
    })
}

impl VideoFeed for SyntheticVideoFeed {
    fn label(&self) -> &str {
        &self.label
    }

    fn native_size(&self) -> Option<FrameSize> {
        lock(&self.state).native
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        if !self.is_live() {
            return None;
        }
        lock(&self.state).frame.clone()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.live.store(false, Ordering::Release);
        self.end.fire();
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.end.subscribe()
    }
}

/// Microphone producing a quiet sine tone in 20 ms blocks.
pub struct SyntheticAudioFeed {
    label: String,
    sample_rate: u32,
    channels: u16,
    phase: Mutex<f64>,
    blocks: AtomicU64,
    live: AtomicBool,
    stops: AtomicUsize,
}

impl SyntheticAudioFeed {
    pub fn new(label: impl Into<String>, sample_rate: u32, channels: u16) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            sample_rate,
            channels: channels.max(1),
            phase: Mutex::new(0.0),
            blocks: AtomicU64::new(0),
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        })
    }

    /// Blocks handed out so far.
    pub fn blocks_taken(&self) -> u64 {
        self.blocks.load(Ordering::Acquire)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }
}

impl AudioFeed for SyntheticAudioFeed {
    fn label(&self) -> &str {
        &self.label
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn take_samples(&self) -> Option<AudioBlock> {
        if !self.is_live() {
            return None;
        }
        let frames = (self.sample_rate / 50) as usize;
        let step = 2.0 * std::f64::consts::PI * 440.0 / f64::from(self.sample_rate.max(1));
        let mut phase = lock(&self.phase);
        let mut samples = Vec::with_capacity(frames * self.channels as usize);
        for _ in 0..frames {
            let value = (phase.sin() * 0.1) as f32;
            *phase = (*phase + step) % (2.0 * std::f64::consts::PI);
            samples.extend(std::iter::repeat(value).take(self.channels as usize));
        }
        self.blocks.fetch_add(1, Ordering::AcqRel);
        Some(AudioBlock {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        })
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.live.store(false, Ordering::Release);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Acquisition failure a [`SyntheticBackend`] can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    PermissionDenied,
    NoDevice,
    Cancelled,
}

impl FailureMode {
    fn to_error(self, what: &str) -> ClipmixError {
        match self {
            Self::PermissionDenied => {
                ClipmixError::permission_denied(format!("Permission to capture the {what} was denied"))
            }
            Self::NoDevice => ClipmixError::device_not_found(format!("No {what} available")),
            Self::Cancelled => ClipmixError::cancelled(format!("{what} selection was cancelled")),
        }
    }
}

/// Capture backend handing out synthetic feeds and recording what it did.
pub struct SyntheticBackend {
    screen_size: FrameSize,
    animate: bool,
    display_failure: Mutex<Option<FailureMode>>,
    microphone_failure: Mutex<Option<FailureMode>>,
    camera_failure: Mutex<Option<FailureMode>>,
    display_requests: Mutex<Vec<DisplayRequest>>,
    displays: Mutex<Vec<Arc<SyntheticVideoFeed>>>,
    unreleased_at_acquire: Mutex<Vec<usize>>,
    microphones: Mutex<Vec<Arc<SyntheticAudioFeed>>>,
    cameras: Mutex<Vec<Arc<SyntheticVideoFeed>>>,
}

impl SyntheticBackend {
    pub fn new(screen_size: FrameSize) -> Self {
        Self {
            screen_size,
            animate: false,
            display_failure: Mutex::new(None),
            microphone_failure: Mutex::new(None),
            camera_failure: Mutex::new(None),
            display_requests: Mutex::new(Vec::new()),
            displays: Mutex::new(Vec::new()),
            unreleased_at_acquire: Mutex::new(Vec::new()),
            microphones: Mutex::new(Vec::new()),
            cameras: Mutex::new(Vec::new()),
        }
    }

    /// Feeds run a moving test pattern instead of a still frame.
    pub fn animated(mut self) -> Self {
        self.animate = true;
        self
    }

    pub fn fail_display(&self, mode: Option<FailureMode>) {
        *lock(&self.display_failure) = mode;
    }

    pub fn fail_microphone(&self, mode: Option<FailureMode>) {
        *lock(&self.microphone_failure) = mode;
    }

    pub fn fail_camera(&self, mode: Option<FailureMode>) {
        *lock(&self.camera_failure) = mode;
    }

    pub fn display_requests(&self) -> Vec<DisplayRequest> {
        lock(&self.display_requests).clone()
    }

    pub fn displays(&self) -> Vec<Arc<SyntheticVideoFeed>> {
        lock(&self.displays).clone()
    }

    /// For each display handed out, how many earlier displays had not been
    /// stopped yet at that moment.
    pub fn unreleased_displays_at_acquire(&self) -> Vec<usize> {
        lock(&self.unreleased_at_acquire).clone()
    }

    pub fn microphones(&self) -> Vec<Arc<SyntheticAudioFeed>> {
        lock(&self.microphones).clone()
    }

    pub fn cameras(&self) -> Vec<Arc<SyntheticVideoFeed>> {
        lock(&self.cameras).clone()
    }

    fn sources(&self) -> Vec<Source> {
        vec![
            Source::new("window:1", "Synthetic editor", SourceKind::Window),
            Source::new("screen:0", "Synthetic display", SourceKind::Screen),
            Source::new("camera:0", "Synthetic camera", SourceKind::Camera),
        ]
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn list_sources(&self) -> ClipmixResult<Vec<Source>> {
        Ok(self.sources())
    }

    async fn acquire_display(&self, request: &DisplayRequest) -> ClipmixResult<Arc<dyn VideoFeed>> {
        lock(&self.display_requests).push(request.clone());
        if let Some(mode) = *lock(&self.display_failure) {
            return Err(mode.to_error("screen"));
        }

        let sources = self.sources();
        let source = match &request.source_id {
            Some(id) => sources.iter().find(|s| &s.id == id).ok_or_else(|| {
                ClipmixError::device_not_found(format!("No capturable source with id '{id}'"))
            })?,
            None => Source::default_display(&sources)
                .ok_or_else(|| ClipmixError::device_not_found("No capturable display"))?,
        };

        let base = [20, 40, 90, 255];
        let feed = SyntheticVideoFeed::solid(source.label.clone(), self.screen_size, base);
        if self.animate {
            feed.spawn_pattern(self.screen_size, request.frame_rate, base);
        }
        let mut displays = lock(&self.displays);
        let unreleased = displays.iter().filter(|d| d.stop_count() == 0).count();
        lock(&self.unreleased_at_acquire).push(unreleased);
        displays.push(Arc::clone(&feed));
        Ok(feed)
    }

    async fn acquire_microphone(&self) -> ClipmixResult<Arc<dyn AudioFeed>> {
        if let Some(mode) = *lock(&self.microphone_failure) {
            return Err(mode.to_error("microphone"));
        }
        let feed = SyntheticAudioFeed::new("Synthetic microphone", 48_000, 2);
        lock(&self.microphones).push(Arc::clone(&feed));
        Ok(feed)
    }

    async fn acquire_camera(&self, request: &CameraRequest) -> ClipmixResult<Arc<dyn VideoFeed>> {
        if let Some(mode) = *lock(&self.camera_failure) {
            return Err(mode.to_error("camera"));
        }
        let size = FrameSize::new(request.ideal_width, request.ideal_height);
        let base = [150, 60, 40, 255];
        let feed = SyntheticVideoFeed::solid("Synthetic camera", size, base);
        if self.animate {
            feed.spawn_pattern(size, 30, base);
        }
        lock(&self.cameras).push(Arc::clone(&feed));
        Ok(feed)
    }
}

/// Counters shared by every encoder a [`SyntheticEncoderBackend`] opens.
#[derive(Debug, Default)]
pub struct EncoderCounters {
    pub video_frames: AtomicU64,
    pub audio_blocks: AtomicU64,
    pub drains: AtomicU64,
    pub finishes: AtomicU64,
}

/// Encoder backend emitting small deterministic records instead of media.
pub struct SyntheticEncoderBackend {
    supported: Vec<String>,
    fail_after_frames: Option<u64>,
    opened: Mutex<Vec<EncoderParams>>,
    counters: Arc<EncoderCounters>,
}

impl Default for SyntheticEncoderBackend {
    fn default() -> Self {
        Self::supporting(&[MIME_VP9_OPUS, MIME_VP9, MIME_WEBM])
    }
}

impl SyntheticEncoderBackend {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            fail_after_frames: None,
            opened: Mutex::new(Vec::new()),
            counters: Arc::new(EncoderCounters::default()),
        }
    }

    /// Make every encoder fail on the frame after `frames` successful ones.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after_frames = Some(frames);
        self
    }

    pub fn opened(&self) -> Vec<EncoderParams> {
        lock(&self.opened).clone()
    }

    pub fn counters(&self) -> Arc<EncoderCounters> {
        Arc::clone(&self.counters)
    }
}

impl EncoderBackend for SyntheticEncoderBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn open(&self, params: &EncoderParams) -> ClipmixResult<Box<dyn IncrementalEncoder>> {
        if !self.is_type_supported(&params.mime_type) {
            return Err(ClipmixError::unsupported(format!(
                "Synthetic encoder cannot produce '{}'",
                params.mime_type
            )));
        }
        lock(&self.opened).push(params.clone());
        Ok(Box::new(SyntheticEncoder {
            pending: b"HDR".to_vec(),
            frames: 0,
            fail_after_frames: self.fail_after_frames,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct SyntheticEncoder {
    pending: Vec<u8>,
    frames: u64,
    fail_after_frames: Option<u64>,
    counters: Arc<EncoderCounters>,
}

impl IncrementalEncoder for SyntheticEncoder {
    fn encode_video(&mut self, frame: &VideoFrame, pts_ns: u64) -> ClipmixResult<()> {
        if self.fail_after_frames.is_some_and(|limit| self.frames >= limit) {
            return Err(ClipmixError::encoder("Synthetic encoder failure"));
        }
        self.frames += 1;
        self.counters.video_frames.fetch_add(1, Ordering::AcqRel);
        self.pending.push(b'V');
        self.pending.extend_from_slice(&pts_ns.to_le_bytes());
        self.pending.extend_from_slice(&frame.image.width().to_le_bytes());
        Ok(())
    }

    fn encode_audio(&mut self, block: &AudioBlock, pts_ns: u64) -> ClipmixResult<()> {
        self.counters.audio_blocks.fetch_add(1, Ordering::AcqRel);
        self.pending.push(b'A');
        self.pending.extend_from_slice(&pts_ns.to_le_bytes());
        self.pending
            .extend_from_slice(&(block.samples.len() as u32).to_le_bytes());
        Ok(())
    }

    fn drain(&mut self) -> ClipmixResult<Vec<u8>> {
        self.counters.drains.fetch_add(1, Ordering::AcqRel);
        Ok(std::mem::take(&mut self.pending))
    }

    fn finish(mut self: Box<Self>) -> ClipmixResult<Vec<u8>> {
        self.counters.finishes.fetch_add(1, Ordering::AcqRel);
        self.pending.extend_from_slice(b"END");
        Ok(std::mem::take(&mut self.pending))
    }
}
