//! Adaptive write pacing for the playback ring.
//!
//! The writer keeps at most `current` frames queued in the hardware ring by
//! sleeping before each write until the ring has drained to that level.
//! `current` follows a `target` chosen from the power disposition:
//!
//! - **Short** (2 periods): screen on, or a capture session is active.
//!   Low latency.
//! - **Long** (8 periods): screen off and nothing capturing. Fewer wakeups.
//!
//! The threshold moves toward the target by a quarter period per write so
//! the write cadence never changes abruptly. When the ring is found badly
//! depleted the threshold snaps just above the current fill so the writer
//! can catch up.

use pcmhal_core::{Clock, OUT_LONG_PERIOD_COUNT, OUT_PERIOD_SIZE, OUT_SHORT_PERIOD_COUNT};
use std::time::Duration;

/// Shortest sleep worth taking; anything below is skipped.
pub const MIN_PACING_SLEEP: Duration = Duration::from_micros(2000);

/// Cap on the total pacing sleep of a single write: the play-out time of
/// two periods at 48 kHz.
pub const MAX_PACING_SLEEP: Duration =
    Duration::from_micros((OUT_PERIOD_SIZE * OUT_SHORT_PERIOD_COUNT * 1_000_000 / 48000) as u64);

/// Power disposition of the playback ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Freshly started; no target chosen yet.
    #[default]
    Unknown,
    /// Latency-favoring depth.
    Short,
    /// Power-favoring depth.
    Long,
}

impl Disposition {
    /// Pick the disposition for the given device conditions.
    pub fn choose(screen_off: bool, capture_active: bool) -> Self {
        if screen_off && !capture_active {
            Disposition::Long
        } else {
            Disposition::Short
        }
    }

    /// Ring depth in periods.
    pub const fn period_count(self) -> usize {
        match self {
            Disposition::Long => OUT_LONG_PERIOD_COUNT,
            Disposition::Short | Disposition::Unknown => OUT_SHORT_PERIOD_COUNT,
        }
    }
}

/// Point-in-time view of the pacing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSnapshot {
    /// Threshold in effect for the next write, in frames.
    pub current: usize,
    /// Threshold being converged to, in frames.
    pub target: usize,
    /// Disposition the target was chosen for.
    pub disposition: Disposition,
}

/// Write-threshold controller for one playback session.
#[derive(Debug, Clone)]
pub struct WritePacer {
    period_size: usize,
    current: usize,
    target: usize,
    disposition: Disposition,
}

impl WritePacer {
    /// Create a pacer for a ring with the given period size.
    pub fn new(period_size: usize) -> Self {
        Self {
            period_size,
            current: 0,
            target: 0,
            disposition: Disposition::Unknown,
        }
    }

    /// Upper bound the threshold can ever reach.
    pub const fn threshold_max(period_size: usize) -> usize {
        period_size * OUT_LONG_PERIOD_COUNT + period_size / 4
    }

    /// Current state.
    pub fn snapshot(&self) -> PacingSnapshot {
        PacingSnapshot {
            current: self.current,
            target: self.target,
            disposition: self.disposition,
        }
    }

    /// Apply a disposition. Returns true when the target changed.
    ///
    /// The first disposition after start also sets the current threshold
    /// so the session starts at its target depth.
    pub fn set_disposition(&mut self, wanted: Disposition) -> bool {
        if wanted == self.disposition || wanted == Disposition::Unknown {
            return false;
        }
        self.target = self.period_size * wanted.period_count();
        if self.disposition == Disposition::Unknown {
            self.current = self.target;
        }
        tracing::debug!(
            from = ?self.disposition,
            to = ?wanted,
            target = self.target,
            "write threshold target changed"
        );
        self.disposition = wanted;
        true
    }

    /// Sleep until at most `current` frames are queued.
    ///
    /// `queued` reports frames in the ring, or `None` when the position is
    /// unavailable (treated as an empty ring). Returns the last queued
    /// count observed.
    pub fn pace(
        &self,
        rate: u32,
        clock: &dyn Clock,
        mut queued: impl FnMut() -> Option<usize>,
    ) -> usize {
        if rate == 0 {
            return 0;
        }
        let max_us = MAX_PACING_SLEEP.as_micros() as u64;
        let min_us = MIN_PACING_SLEEP.as_micros() as u64;
        let mut total_us = 0u64;
        loop {
            let Some(kernel) = queued() else {
                return 0;
            };
            if kernel > self.current {
                let mut sleep_us =
                    (kernel - self.current) as u64 * 1_000_000 / u64::from(rate);
                if sleep_us < min_us {
                    return kernel;
                }
                total_us += sleep_us;
                if total_us > max_us {
                    sleep_us = max_us - (total_us - sleep_us);
                }
                clock.sleep(Duration::from_micros(sleep_us));
            }
            if kernel <= self.current || total_us > max_us {
                return kernel;
            }
        }
    }

    /// Move the current threshold one step toward the target.
    ///
    /// `kernel` is the queued count observed by the last [`pace`](Self::pace).
    pub fn converge(&mut self, kernel: usize) {
        let step = self.period_size / 4;
        if self.current > self.target {
            self.current = self.current.saturating_sub(step).max(self.target);
        } else if self.current < self.target {
            self.current = (self.current + step).min(self.target);
        } else if kernel < self.target
            && self.target - kernel > self.period_size * OUT_SHORT_PERIOD_COUNT
        {
            self.current = (kernel / self.period_size + 1) * self.period_size + step;
        }
    }
}
