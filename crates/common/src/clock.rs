//! Clock and timing utilities for live recording.
//!
//! A recording is anchored to a monotonic epoch captured when the session
//! starts. This module provides:
//! - The recording clock, with paused spans excluded from active time
//! - A rate controller that throttles a fast cadence down to a target rate
//! - Timer formatting for elapsed-time displays

use std::time::{Duration, Instant};

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,

    /// Set while the recording is paused.
    paused_at: Option<Instant>,

    /// Total time spent paused, excluding the current pause.
    paused_total: Duration,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Mark the start of a paused span. Repeated calls are ignored.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Close the current paused span, if any.
    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Wall time since the epoch, paused spans included.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Recorded time since the epoch, paused spans excluded.
    pub fn active_elapsed(&self) -> Duration {
        let current_pause = self.paused_at.map(|at| at.elapsed()).unwrap_or_default();
        self.epoch
            .elapsed()
            .saturating_sub(self.paused_total + current_pause)
    }

    /// Get seconds of recorded (non-paused) time.
    pub fn active_secs(&self) -> f64 {
        self.active_elapsed().as_secs_f64()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Throttles a faster tick cadence down to a target rate.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    ///
    /// The next deadline advances by whole intervals from the previous one,
    /// so a slightly late cadence does not drift the output rate down.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                let behind = (current_ns - last) / self.target_interval_ns;
                let next = last + behind * self.target_interval_ns;
                // Do not accumulate a backlog after a long stall.
                self.last_tick_ns = Some(if current_ns - next >= self.target_interval_ns {
                    current_ns
                } else {
                    next
                });
                true
            }
            _ => false,
        }
    }
}

/// Format seconds as `MM:SS` for a recording timer.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
