//! Real-time compositor: screen frame plus shaped webcam overlay.
//!
//! A single tokio task owns the canvas and both frame sources. It wakes at a
//! redraw cadence of at least 60 Hz, throttles itself down to the configured
//! frame rate, and publishes one composite frame per output tick through a
//! watch channel read by [`OutputStreamSink`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipmix_common::{ClipmixResult, RateController};
use clipmix_media_model::CompositorConfig;
use clipmix_platform_core::{EndSignal, FrameSize, VideoFeed, VideoFrame};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adapter::FrameSourceAdapter;
use crate::canvas::Canvas;
use crate::layout::{contain_rect, fit_output_size, overlay_rect, PLACEHOLDER_SIZE};
use crate::shape::ClipShape;
use crate::sink::OutputStreamSink;

/// Redraw cadence the loop wakes at before throttling.
pub const REDRAW_HZ: u32 = 60;

/// Counters for one compositor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Redraw wake-ups, including throttled ones.
    pub ticks: u64,
    /// Composite frames published.
    pub frames: u64,
    /// Canvas resizes after the initial allocation.
    pub resizes: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    ticks: AtomicU64,
    frames: AtomicU64,
    resizes: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> CompositorStats {
        CompositorStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            resizes: self.resizes.load(Ordering::Relaxed),
        }
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
    end: EndSignal,
    size: watch::Receiver<FrameSize>,
    stats: Arc<StatCounters>,
}

/// Merges a primary feed and an optional overlay feed into one stream.
pub struct Compositor {
    config: CompositorConfig,
    run: Option<ActiveRun>,
    last_stats: CompositorStats,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            run: None,
            last_stats: CompositorStats::default(),
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::Acquire))
    }

    /// Start compositing and return the output stream.
    ///
    /// A previous run is stopped first. Must be called within a tokio runtime.
    pub async fn start(
        &mut self,
        primary: Arc<dyn VideoFeed>,
        secondary: Option<Arc<dyn VideoFeed>>,
    ) -> ClipmixResult<OutputStreamSink> {
        self.config.validate()?;
        self.stop().await;

        let initial = fit_output_size(
            primary.native_size().unwrap_or(PLACEHOLDER_SIZE),
            self.config.max_width,
            self.config.max_height,
        );

        let (frame_tx, frame_rx) = watch::channel(None);
        let (size_tx, size_rx) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let end = EndSignal::new();
        let stats = Arc::new(StatCounters::default());

        let tick_loop = TickLoop {
            config: self.config.clone(),
            clip: ClipShape::from_config(&self.config),
            primary: FrameSourceAdapter::attach(primary),
            secondary: secondary.map(FrameSourceAdapter::attach),
            canvas: Some(Canvas::new(initial, self.config.background)),
            last_native: None,
            frame_tx,
            size_tx,
            sequence: 0,
            stats: Arc::clone(&stats),
        };

        tracing::info!(
            width = initial.width,
            height = initial.height,
            fps = self.config.frame_rate,
            overlay = tick_loop.secondary.is_some(),
            corner = %self.config.corner,
            shape = %self.config.shape,
            "Compositor starting"
        );

        let task = tokio::spawn(tick_loop.run(cancel.clone(), Arc::clone(&running)));

        self.run = Some(ActiveRun {
            cancel,
            running,
            task,
            end: end.clone(),
            size: size_rx.clone(),
            stats,
        });

        Ok(OutputStreamSink::new(
            frame_rx,
            size_rx,
            self.config.frame_rate,
            end,
        ))
    }

    /// Stop the tick loop and release the canvas.
    ///
    /// Waits for an in-flight tick to finish. Safe to call repeatedly and
    /// before any start.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        run.running.store(false, Ordering::Release);
        run.cancel.cancel();
        if let Err(e) = run.task.await {
            tracing::error!(error = %e, "Compositor tick loop did not exit cleanly");
        }
        run.end.fire();

        self.last_stats = run.stats.snapshot();
        tracing::info!(
            frames = self.last_stats.frames,
            resizes = self.last_stats.resizes,
            "Compositor stopped"
        );
    }

    /// Current canvas size while running.
    pub fn output_size(&self) -> Option<FrameSize> {
        self.run.as_ref().map(|run| *run.size.borrow())
    }

    /// Counters of the current run, or of the last finished one.
    pub fn stats(&self) -> CompositorStats {
        self.run
            .as_ref()
            .map_or(self.last_stats, |run| run.stats.snapshot())
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.running.store(false, Ordering::Release);
            run.cancel.cancel();
            run.end.fire();
        }
    }
}

/// State owned by the tick task.
struct TickLoop {
    config: CompositorConfig,
    clip: ClipShape,
    primary: FrameSourceAdapter,
    secondary: Option<FrameSourceAdapter>,
    canvas: Option<Canvas>,
    last_native: Option<FrameSize>,
    frame_tx: watch::Sender<Option<Arc<VideoFrame>>>,
    size_tx: watch::Sender<FrameSize>,
    sequence: u64,
    stats: Arc<StatCounters>,
}

impl TickLoop {
    async fn run(mut self, cancel: CancellationToken, running: Arc<AtomicBool>) {
        let mut rate = RateController::new(self.config.frame_rate);
        let cadence_ns = 1_000_000_000 / u64::from(REDRAW_HZ.max(self.config.frame_rate));
        let mut interval = tokio::time::interval(Duration::from_nanos(cadence_ns));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let origin = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if !running.load(Ordering::Acquire) {
                break;
            }

            self.stats.ticks.fetch_add(1, Ordering::Relaxed);
            let now_ns = origin.elapsed().as_nanos() as u64;
            // Half a cadence of slack keeps integer rounding from skipping an
            // output frame.
            if !rate.should_tick(now_ns + cadence_ns / 2) {
                continue;
            }
            self.render(now_ns);
        }

        self.release();
    }

    fn render(&mut self, timestamp_ns: u64) {
        self.sync_canvas_size();
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };

        canvas.clear();
        let canvas_size = canvas.size();

        self.primary
            .draw_placed(canvas, |frame| contain_rect(frame, canvas_size), None);

        if let Some(secondary) = &self.secondary {
            if secondary.current_frame_ready() {
                let rect = overlay_rect(canvas_size, secondary.aspect_ratio(), &self.config);
                secondary.draw_into(canvas, rect, Some(self.clip));
            }
        }

        let frame = VideoFrame::new(canvas.snapshot(), timestamp_ns, self.sequence);
        self.sequence += 1;
        self.frame_tx.send_replace(Some(Arc::new(frame)));
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Re-fit the canvas whenever the primary feed reports a new native size.
    fn sync_canvas_size(&mut self) {
        let Some(native) = self.primary.native_size() else {
            return;
        };
        if self.last_native == Some(native) {
            return;
        }
        self.last_native = Some(native);

        let target = fit_output_size(native, self.config.max_width, self.config.max_height);
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        let previous = canvas.size();
        if canvas.resize(target) {
            self.stats.resizes.fetch_add(1, Ordering::Relaxed);
            self.size_tx.send_replace(target);
            tracing::debug!(
                native = %native,
                from = %previous,
                to = %target,
                "Compositor canvas resized"
            );
        }
    }

    fn release(&mut self) {
        self.primary.detach();
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.detach();
        }
        self.canvas = None;
    }
}
