//! Recording session controller.
//!
//! Owns the lifecycle of one recording: device acquisition, optional
//! compositing, the encoder pump, and release of everything it opened.
//!
//! ```text
//! Idle ──start──► Recording ◄──resume── Paused
//!                    │  └─────pause──────► │
//!                    └──stop / track end───┴──► Stopped
//! (failed start or empty failed encode) ──► Idle
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use clipmix_common::{ClipmixError, ClipmixResult, RecordingClock};
use clipmix_media_model::{
    CompositorConfig, FinishedRecording, QualityConfig, QualityPreset, SessionState,
};
use clipmix_platform_core::{AudioFeed, CaptureBackend, DisplayRequest, FrameSize, Source, VideoFeed};
use clipmix_render_engine::{fit_output_size, Compositor};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::encoder::{mime_carries_audio, select_mime_type, AudioFormat, EncoderBackend, EncoderParams};
use crate::recorder::{MediaRecorder, MediaStream, RecorderConfig, RecorderControl, RecorderOutcome};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Options for one recording.
#[derive(Clone)]
pub struct StartOptions {
    /// Try to record the microphone. Failure to open it is not fatal.
    pub audio: bool,
    /// Live webcam to overlay. The caller keeps ownership and releases it.
    pub webcam: Option<Arc<dyn VideoFeed>>,
    pub quality: QualityPreset,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            audio: true,
            webcam: None,
            quality: QualityPreset::Medium,
        }
    }
}

impl std::fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("audio", &self.audio)
            .field("webcam", &self.webcam.as_ref().map(|w| w.label().to_string()))
            .field("quality", &self.quality)
            .finish()
    }
}

/// Everything a session opened, released by a single routine.
#[derive(Default)]
struct Teardown {
    compositor: Option<Compositor>,
    screen: Option<Arc<dyn VideoFeed>>,
    microphone: Option<Arc<dyn AudioFeed>>,
    already_ran: bool,
}

impl Teardown {
    /// Release the compositor and every owned feed. Runs at most once.
    async fn run(&mut self) {
        if self.already_ran {
            return;
        }
        self.already_ran = true;

        if let Some(mut compositor) = self.compositor.take() {
            compositor.stop().await;
        }
        if let Some(screen) = self.screen.take() {
            screen.stop();
            tracing::debug!(feed = screen.label(), "Screen feed released");
        }
        if let Some(microphone) = self.microphone.take() {
            microphone.stop();
            tracing::debug!(feed = microphone.label(), "Microphone released");
        }
    }
}

/// State visible to the controller and its supervisor task.
struct Shared {
    state: watch::Sender<SessionState>,
    control: Mutex<Option<RecorderControl>>,
    finalizing: AtomicBool,
    /// End signal of the current screen feed.
    screen_ended: Mutex<Option<watch::Receiver<bool>>>,
    last_error: Mutex<Option<String>>,
    finished: Mutex<Option<FinishedRecording>>,
    clock: Mutex<Option<RecordingClock>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }

    /// Atomically move `from` → `to`. Returns whether it happened.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn control(&self) -> Option<RecorderControl> {
        lock(&self.control).clone()
    }

    /// Whether the running session is already on its way out, either through
    /// `stop()` or because the screen track ended.
    fn is_finalizing(&self) -> bool {
        self.finalizing.load(Ordering::Acquire)
            || self.control().map_or(true, |c| c.is_stopping())
            || lock(&self.screen_ended)
                .as_ref()
                .is_some_and(|ended| *ended.borrow())
    }

    fn complete(&self, outcome: RecorderOutcome) {
        *lock(&self.control) = None;
        let bytes = outcome.assemble();
        let failed = outcome.error.is_some();

        if let Some(error) = &outcome.error {
            *lock(&self.last_error) = Some(error.user_message());
        }

        if failed && bytes.is_empty() {
            tracing::error!("Recording failed before any data was encoded");
            *lock(&self.finished) = None;
            self.set_state(SessionState::Idle);
            return;
        }

        let recording = FinishedRecording {
            mime_type: outcome.mime_type,
            bytes,
            duration_ms: outcome.duration.as_millis() as u64,
            chunk_count: outcome.chunks.len(),
            truncated: failed,
            created_at: Local::now(),
        };
        tracing::info!(
            mime = %recording.mime_type,
            bytes = recording.len(),
            chunks = recording.chunk_count,
            duration_secs = recording.duration_secs(),
            reason = ?outcome.reason,
            truncated = recording.truncated,
            "Recording finalized"
        );
        *lock(&self.finished) = Some(recording);
        self.set_state(SessionState::Stopped);
    }
}

/// Drives one recording at a time.
pub struct RecordingSession {
    backend: Arc<dyn CaptureBackend>,
    encoders: Arc<dyn EncoderBackend>,
    compositor_config: CompositorConfig,
    timeslice: Duration,
    selected_source: Mutex<Option<String>>,
    shared: Arc<Shared>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RecordingSession {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        encoders: Arc<dyn EncoderBackend>,
        compositor_config: CompositorConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            backend,
            encoders,
            compositor_config,
            timeslice: RecorderConfig::default().timeslice,
            selected_source: Mutex::new(None),
            shared: Arc::new(Shared {
                state,
                control: Mutex::new(None),
                finalizing: AtomicBool::new(false),
                screen_ended: Mutex::new(None),
                last_error: Mutex::new(None),
                finished: Mutex::new(None),
                clock: Mutex::new(None),
            }),
            supervisor: tokio::sync::Mutex::new(None),
        }
    }

    /// Override how often encoder output is flushed (default one second).
    pub fn with_timeslice(mut self, timeslice: Duration) -> Self {
        self.timeslice = timeslice.max(Duration::from_millis(1));
        self
    }

    /// Remember the source to capture on the next start.
    pub fn select_source(&self, source_id: Option<String>) {
        *lock(&self.selected_source) = source_id;
    }

    pub fn selected_source(&self) -> Option<String> {
        lock(&self.selected_source).clone()
    }

    pub async fn list_sources(&self) -> ClipmixResult<Vec<Source>> {
        self.backend.list_sources().await
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Message of the most recent failure, if any.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Take the finished recording, leaving none behind.
    pub fn take_recording(&self) -> Option<FinishedRecording> {
        lock(&self.shared.finished).take()
    }

    /// Recorded time of the current or last session, excluding pauses.
    pub fn elapsed_secs(&self) -> f64 {
        lock(&self.shared.clock)
            .as_ref()
            .map_or(0.0, RecordingClock::active_secs)
    }

    /// Start recording.
    ///
    /// Fails if a recording is already running. A session that is still
    /// finalizing, including one whose screen track just ended, is awaited
    /// first, so devices are never claimed twice. On any
    /// acquisition failure everything opened so far is released, the state
    /// returns to `Idle`, and the error is also kept as [`Self::last_error`].
    pub async fn start(&self, options: StartOptions) -> ClipmixResult<()> {
        let mut supervisor = self.supervisor.lock().await;

        if let Some(previous) = supervisor.take() {
            if self.state().is_active() && !self.shared.is_finalizing() {
                *supervisor = Some(previous);
                return Err(ClipmixError::invalid_state(
                    "A recording is already in progress",
                ));
            }
            tracing::debug!("Waiting for the previous recording to finalize");
            if let Err(e) = previous.await {
                tracing::error!(error = %e, "Previous session supervisor failed");
            }
        }

        *lock(&self.shared.last_error) = None;
        *lock(&self.shared.finished) = None;
        self.shared.finalizing.store(false, Ordering::Release);
        *lock(&self.shared.screen_ended) = None;

        let quality = options.quality.config();
        tracing::info!(
            quality = %options.quality,
            audio = options.audio,
            webcam = options.webcam.is_some(),
            "Starting recording session"
        );

        let mut teardown = Teardown::default();
        let (control, recorder, screen_ended) = match self.open_pipeline(&options, &quality, &mut teardown).await {
            Ok(started) => started,
            Err(e) => {
                teardown.run().await;
                let message = e.user_message();
                tracing::error!(error = %e, "Recording failed to start");
                *lock(&self.shared.last_error) = Some(message);
                self.shared.set_state(SessionState::Idle);
                return Err(e);
            }
        };

        *lock(&self.shared.control) = Some(control);
        *lock(&self.shared.screen_ended) = Some(screen_ended);
        let clock = RecordingClock::start();
        let started_at = clock.epoch_wall().to_string();
        *lock(&self.shared.clock) = Some(clock);
        self.shared.set_state(SessionState::Recording);

        let shared = Arc::clone(&self.shared);
        *supervisor = Some(tokio::spawn(async move {
            let outcome = recorder.finished().await;
            shared.finalizing.store(true, Ordering::Release);
            if let Some(clock) = lock(&shared.clock).as_mut() {
                clock.pause();
            }
            teardown.run().await;
            shared.complete(outcome);
        }));

        tracing::info!(%started_at, "Recording session started");
        Ok(())
    }

    async fn open_pipeline(
        &self,
        options: &StartOptions,
        quality: &QualityConfig,
        teardown: &mut Teardown,
    ) -> ClipmixResult<(RecorderControl, MediaRecorder, watch::Receiver<bool>)> {
        let request = DisplayRequest {
            source_id: self.selected_source(),
            frame_rate: quality.frame_rate,
            max_width: quality.width,
            max_height: quality.height,
        };
        let screen = self.backend.acquire_display(&request).await?;
        teardown.screen = Some(Arc::clone(&screen));
        tracing::info!(feed = screen.label(), "Screen feed acquired");
        let screen_ended = screen.ended();

        let video: Arc<dyn VideoFeed> = match &options.webcam {
            Some(webcam) => {
                let mut compositor =
                    Compositor::new(self.compositor_config.clone().with_quality(quality));
                let started = compositor
                    .start(Arc::clone(&screen), Some(Arc::clone(webcam)))
                    .await;
                teardown.compositor = Some(compositor);
                Arc::new(started?)
            }
            None => Arc::clone(&screen),
        };

        let microphone = if options.audio {
            match self.backend.acquire_microphone().await {
                Ok(mic) => {
                    teardown.microphone = Some(Arc::clone(&mic));
                    tracing::info!(feed = mic.label(), "Microphone acquired");
                    Some(mic)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Microphone unavailable; recording without audio");
                    None
                }
            }
        } else {
            None
        };

        let mime_type = select_mime_type(self.encoders.as_ref(), microphone.is_some())?;
        let audio = microphone.filter(|_| mime_carries_audio(&mime_type, true));
        if audio.is_none() {
            if let Some(mic) = teardown.microphone.take() {
                mic.stop();
                tracing::warn!(
                    feed = mic.label(),
                    mime = %mime_type,
                    "Output format has no audio track; microphone released"
                );
            }
        }

        let size = fit_output_size(
            video
                .native_size()
                .unwrap_or(FrameSize::new(quality.width, quality.height)),
            Some(quality.width),
            Some(quality.height),
        );
        let mut params = EncoderParams::new(mime_type.clone(), size, quality);
        if let Some(mic) = &audio {
            params = params.with_audio(AudioFormat {
                sample_rate: mic.sample_rate(),
                channels: mic.channels(),
            });
        }
        let encoder = self.encoders.open(&params)?;
        tracing::info!(
            encoder = self.encoders.name(),
            mime = %mime_type,
            width = size.width,
            height = size.height,
            "Encoder opened"
        );

        let mut stream = MediaStream::new(video).with_end_signal(screen_ended.clone());
        if let Some(mic) = audio {
            stream = stream.with_audio(mic);
        }

        let (control, recorder) = MediaRecorder::start(
            stream,
            encoder,
            mime_type,
            RecorderConfig {
                frame_rate: quality.frame_rate,
                timeslice: self.timeslice,
            },
        );
        Ok((control, recorder, screen_ended))
    }

    /// Pause a running recording. No-op unless recording.
    pub fn pause(&self) -> bool {
        let Some(control) = self.shared.control() else {
            return false;
        };
        if !self.shared.transition(SessionState::Recording, SessionState::Paused) {
            return false;
        }
        control.pause();
        if let Some(clock) = lock(&self.shared.clock).as_mut() {
            clock.pause();
        }
        tracing::info!("Recording paused");
        true
    }

    /// Resume a paused recording. No-op unless paused.
    pub fn resume(&self) -> bool {
        let Some(control) = self.shared.control() else {
            return false;
        };
        if !self.shared.transition(SessionState::Paused, SessionState::Recording) {
            return false;
        }
        control.resume();
        if let Some(clock) = lock(&self.shared.clock).as_mut() {
            clock.resume();
        }
        tracing::info!("Recording resumed");
        true
    }

    /// Stop and finalize. Returns once the finished recording is available
    /// and every device is released. No-op unless recording or paused.
    pub async fn stop(&self) {
        let mut supervisor = self.supervisor.lock().await;
        if !self.state().is_active() {
            return;
        }

        tracing::info!("Stopping recording");
        self.shared.finalizing.store(true, Ordering::Release);
        if let Some(control) = self.shared.control() {
            control.stop();
        }
        if let Some(handle) = supervisor.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Session supervisor failed");
                *lock(&self.shared.last_error) = Some(format!("Recording failed: {e}"));
                self.shared.set_state(SessionState::Idle);
            }
        }
    }

    /// Wait until the session is no longer recording or paused, e.g. after
    /// the screen track ended on its own.
    pub async fn wait_finished(&self) -> SessionState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|state| !state.is_active()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(control) = self.shared.control() {
            control.stop();
        }
    }
}
