//! Blocking delays used for backpressure and write pacing.

use std::time::Duration;

/// Source of blocking sleeps.
///
/// Every deliberate delay in the engines goes through this trait so tests can
/// observe the requested durations without actually waiting.
pub trait Clock: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real thread sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Time needed to play or capture `bytes` at `frame_bytes` per frame.
pub fn transfer_time(bytes: usize, frame_bytes: usize, rate: u32) -> Duration {
    if frame_bytes == 0 || rate == 0 {
        return Duration::ZERO;
    }
    let frames = (bytes / frame_bytes) as u64;
    Duration::from_micros(frames * 1_000_000 / u64::from(rate))
}
