//! Chunked encoder driver.
//!
//! [`MediaRecorder`] runs a pump task that samples the video feed at the
//! output rate, drains pending audio, and flushes encoder output into an
//! ordered [`ChunkStore`] at least once per timeslice. The session controller
//! steers it through a [`RecorderControl`] and collects a [`RecorderOutcome`]
//! once it exits.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use clipmix_common::{ClipmixError, ClipmixResult};
use clipmix_platform_core::{AudioFeed, VideoFeed};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::encoder::{EncodedChunk, IncrementalEncoder};

/// Tracks fed to a recorder.
#[derive(Clone)]
pub struct MediaStream {
    pub video: Arc<dyn VideoFeed>,
    pub audio: Option<Arc<dyn AudioFeed>>,
    /// Stops the recorder when it flips to `true`.
    pub source_ended: Option<watch::Receiver<bool>>,
}

impl MediaStream {
    pub fn new(video: Arc<dyn VideoFeed>) -> Self {
        Self {
            video,
            audio: None,
            source_ended: None,
        }
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioFeed>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_end_signal(mut self, ended: watch::Receiver<bool>) -> Self {
        self.source_ended = Some(ended);
        self
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    pub frame_rate: u32,
    /// Longest span of encoded output held before it is flushed.
    pub timeslice: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            timeslice: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Record,
    Pause,
    Stop,
}

/// Handle for steering a running recorder. Dropping every handle stops it.
#[derive(Debug, Clone)]
pub struct RecorderControl {
    tx: Arc<watch::Sender<RecorderCommand>>,
}

impl RecorderControl {
    /// Returns `false` unless the recorder was recording.
    pub fn pause(&self) -> bool {
        self.transition(RecorderCommand::Record, RecorderCommand::Pause)
    }

    /// Returns `false` unless the recorder was paused.
    pub fn resume(&self) -> bool {
        self.transition(RecorderCommand::Pause, RecorderCommand::Record)
    }

    pub fn stop(&self) {
        self.tx.send_replace(RecorderCommand::Stop);
    }

    pub fn command(&self) -> RecorderCommand {
        *self.tx.borrow()
    }

    pub fn is_stopping(&self) -> bool {
        self.command() == RecorderCommand::Stop
    }

    fn transition(&self, from: RecorderCommand, to: RecorderCommand) -> bool {
        self.tx.send_if_modified(|cmd| {
            if *cmd == from {
                *cmd = to;
                true
            } else {
                false
            }
        })
    }
}

/// Encoded chunks in production order, shared with observers.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Arc<Mutex<Vec<EncodedChunk>>>,
}

impl ChunkStore {
    fn lock(&self) -> MutexGuard<'_, Vec<EncodedChunk>> {
        self.chunks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, timestamp_ns: u64, data: Vec<u8>) {
        let mut chunks = self.lock();
        let sequence = chunks.len() as u64;
        chunks.push(EncodedChunk {
            sequence,
            timestamp_ns,
            data,
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.lock().iter().map(|c| c.data.len()).sum()
    }

    /// Remove and return every chunk.
    pub fn take_all(&self) -> Vec<EncodedChunk> {
        std::mem::take(&mut *self.lock())
    }
}

/// Why the recorder stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called or every control handle was dropped.
    Requested,
    /// The source track terminated.
    SourceEnded,
    /// The encoder returned an error; output is a best-effort tail.
    EncoderFailed,
}

/// Everything the recorder produced.
#[derive(Debug)]
pub struct RecorderOutcome {
    pub mime_type: String,
    pub chunks: Vec<EncodedChunk>,
    pub frames_encoded: u64,
    /// Recorded media time, excluding paused spans.
    pub duration: Duration,
    pub reason: StopReason,
    pub error: Option<ClipmixError>,
}

impl RecorderOutcome {
    /// Concatenate all chunks.
    pub fn assemble(&self) -> Vec<u8> {
        let total = self.chunks.iter().map(|c| c.data.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.data);
        }
        bytes
    }
}

/// A running encoder pump.
pub struct MediaRecorder {
    mime_type: String,
    store: ChunkStore,
    task: JoinHandle<RecorderOutcome>,
}

impl MediaRecorder {
    /// Start pumping `stream` into `encoder`. Must be called within a tokio
    /// runtime.
    pub fn start(
        stream: MediaStream,
        encoder: Box<dyn IncrementalEncoder>,
        mime_type: impl Into<String>,
        config: RecorderConfig,
    ) -> (RecorderControl, MediaRecorder) {
        let mime_type = mime_type.into();
        let (tx, rx) = watch::channel(RecorderCommand::Record);
        let store = ChunkStore::default();

        tracing::info!(
            mime = %mime_type,
            fps = config.frame_rate,
            timeslice_ms = config.timeslice.as_millis() as u64,
            audio = stream.has_audio(),
            "Recorder started"
        );

        let pump = Pump {
            stream,
            encoder: Some(encoder),
            store: store.clone(),
            mime_type: mime_type.clone(),
            frame_period_ns: 1_000_000_000 / u64::from(config.frame_rate.max(1)),
            frames: 0,
            audio_pts_ns: 0,
        };
        let task = tokio::spawn(pump.run(rx, config));

        (
            RecorderControl { tx: Arc::new(tx) },
            MediaRecorder {
                mime_type,
                store,
                task,
            },
        )
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Live view of flushed chunks.
    pub fn chunks(&self) -> &ChunkStore {
        &self.store
    }

    /// Wait for the pump to exit and the encoder to finalize.
    pub async fn finished(self) -> RecorderOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RecorderOutcome {
                mime_type: self.mime_type,
                chunks: self.store.take_all(),
                frames_encoded: 0,
                duration: Duration::ZERO,
                reason: StopReason::EncoderFailed,
                error: Some(ClipmixError::encoder(format!("Recorder task failed: {e}"))),
            },
        }
    }
}

struct Pump {
    stream: MediaStream,
    encoder: Option<Box<dyn IncrementalEncoder>>,
    store: ChunkStore,
    mime_type: String,
    frame_period_ns: u64,
    frames: u64,
    audio_pts_ns: u64,
}

impl Pump {
    async fn run(mut self, mut control: watch::Receiver<RecorderCommand>, config: RecorderConfig) -> RecorderOutcome {
        let mut frame_tick = tokio::time::interval(Duration::from_nanos(self.frame_period_ns));
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut flush_tick = tokio::time::interval_at(Instant::now() + config.timeslice, config.timeslice);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut source_ended = self.stream.source_ended.take();
        let mut paused = false;

        let (reason, error) = loop {
            tokio::select! {
                biased;
                changed = control.changed() => {
                    if changed.is_err() {
                        break (StopReason::Requested, None);
                    }
                    let command = *control.borrow_and_update();
                    match command {
                        RecorderCommand::Stop => break (StopReason::Requested, None),
                        RecorderCommand::Pause if !paused => {
                            paused = true;
                            tracing::info!(frames = self.frames, "Recorder paused");
                        }
                        RecorderCommand::Record if paused => {
                            paused = false;
                            tracing::info!(frames = self.frames, "Recorder resumed");
                        }
                        _ => {}
                    }
                }
                _ = wait_source_end(&mut source_ended) => {
                    tracing::info!("Source track ended; stopping recorder");
                    break (StopReason::SourceEnded, None);
                }
                _ = frame_tick.tick() => {
                    if paused {
                        self.discard_audio();
                    } else if let Err(e) = self.encode_tick() {
                        break (StopReason::EncoderFailed, Some(e));
                    }
                }
                _ = flush_tick.tick() => {
                    if let Err(e) = self.flush() {
                        break (StopReason::EncoderFailed, Some(e));
                    }
                }
            }
        };

        self.finalize(reason, error)
    }

    fn encode_tick(&mut self) -> ClipmixResult<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };

        if let Some(frame) = self.stream.video.latest_frame() {
            let pts = self.frames * self.frame_period_ns;
            encoder.encode_video(&frame, pts)?;
            self.frames += 1;
        }

        if let Some(audio) = &self.stream.audio {
            if let Some(block) = audio.take_samples() {
                encoder.encode_audio(&block, self.audio_pts_ns)?;
                self.audio_pts_ns += block.duration_ns();
            }
        }
        Ok(())
    }

    fn discard_audio(&self) {
        if let Some(audio) = &self.stream.audio {
            let _ = audio.take_samples();
        }
    }

    fn flush(&mut self) -> ClipmixResult<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        let data = encoder.drain()?;
        if !data.is_empty() {
            tracing::debug!(
                bytes = data.len(),
                chunk = self.store.len(),
                total_bytes = self.store.total_bytes(),
                "Encoder chunk flushed"
            );
            self.store.push(self.frames * self.frame_period_ns, data);
        }
        Ok(())
    }

    fn finalize(mut self, mut reason: StopReason, mut error: Option<ClipmixError>) -> RecorderOutcome {
        if error.is_none() {
            if let Err(e) = self.flush() {
                reason = StopReason::EncoderFailed;
                error = Some(e);
            }
        }

        if let Some(encoder) = self.encoder.take() {
            match encoder.finish() {
                Ok(tail) if !tail.is_empty() => {
                    self.store.push(self.frames * self.frame_period_ns, tail);
                }
                Ok(_) => {}
                Err(e) if error.is_none() => {
                    reason = StopReason::EncoderFailed;
                    error = Some(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Encoder finish failed after an earlier error");
                }
            }
        }

        if let Some(e) = &error {
            tracing::error!(error = %e, frames = self.frames, "Recorder stopped on encoder error");
        } else {
            tracing::info!(frames = self.frames, ?reason, "Recorder finished");
        }

        RecorderOutcome {
            mime_type: self.mime_type,
            chunks: self.store.take_all(),
            frames_encoded: self.frames,
            duration: Duration::from_nanos(self.frames * self.frame_period_ns),
            reason,
            error,
        }
    }
}

/// Resolves once the watched track has ended; never resolves otherwise.
async fn wait_source_end(ended: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = ended.as_mut() {
        let fired = rx.wait_for(|ended| *ended).await.is_ok();
        if fired {
            return;
        }
    }
    std::future::pending::<()>().await
}
