//! Deterministic simulated PCM driver.
//!
//! [`SimDriver`] opens sessions that never block and never touch hardware.
//! Results can be scripted per call (avail, read, write) and every open,
//! close and transfer is recorded as a [`SimEvent`], which makes ordering
//! properties (which session closed before which opened) directly testable.
//!
//! Capture sessions produce a ramp: frame `n` carries `n` on the first
//! channel and `-n` on the second.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use pcmhal_core::{
    Direction, Pcm, PcmConfig, PcmDriver, PcmError, PcmInfo, SampleFormat, encode_from_i16,
};

/// Something that happened on a simulated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A session opened.
    Opened {
        /// Session direction.
        direction: Direction,
        /// Node name.
        node: String,
        /// Negotiated rate.
        rate: u32,
        /// Negotiated encoding.
        format: SampleFormat,
    },
    /// A session was dropped.
    Closed {
        /// Session direction.
        direction: Direction,
    },
    /// A write completed.
    Wrote {
        /// Bytes written.
        bytes: usize,
    },
    /// A read completed.
    Read {
        /// Bytes read.
        bytes: usize,
    },
}

#[derive(Debug, Default)]
struct SimState {
    rejected_rates: Vec<u32>,
    fail_opens: bool,
    avail: VecDeque<Result<usize, PcmError>>,
    writes: VecDeque<Result<(), PcmError>>,
    reads: VecDeque<Result<(), PcmError>>,
    events: Vec<SimEvent>,
    last_write: Vec<u8>,
    bytes_written: usize,
}

/// Simulated cards with scripted behavior.
///
/// Clones share the same script and event log.
#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    state: Arc<Mutex<SimState>>,
}

impl SimDriver {
    /// Driver that accepts every open and every transfer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse opens at `rate`.
    pub fn reject_rate(&self, rate: u32) {
        self.state.lock().rejected_rates.push(rate);
    }

    /// Refuse every open.
    pub fn fail_all_opens(&self, fail: bool) {
        self.state.lock().fail_opens = fail;
    }

    /// Queue a result for the next `avail` call on any playback session.
    /// `Ok(n)` reports `n` free frames. With nothing queued the ring is
    /// reported empty.
    pub fn script_avail(&self, result: Result<usize, PcmError>) {
        self.state.lock().avail.push_back(result);
    }

    /// Queue a result for the next write.
    pub fn script_write(&self, result: Result<(), PcmError>) {
        self.state.lock().writes.push_back(result);
    }

    /// Queue a result for the next read.
    pub fn script_read(&self, result: Result<(), PcmError>) {
        self.state.lock().reads.push_back(result);
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Bytes of the most recent successful write.
    pub fn last_write(&self) -> Vec<u8> {
        self.state.lock().last_write.clone()
    }

    /// Total bytes accepted by playback sessions.
    pub fn bytes_written(&self) -> usize {
        self.state.lock().bytes_written
    }
}

impl PcmDriver for SimDriver {
    fn open(
        &self,
        info: &PcmInfo,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError> {
        let mut state = self.state.lock();
        if state.fail_opens {
            return Err(PcmError::NotReady("simulated open failure".into()));
        }
        if state.rejected_rates.contains(&config.rate) {
            return Err(PcmError::NotReady(format!("rate {} rejected", config.rate)));
        }
        state.events.push(SimEvent::Opened {
            direction,
            node: info.node_name(),
            rate: config.rate,
            format: config.format,
        });
        Ok(Box::new(SimPcm {
            config: *config,
            direction,
            state: Arc::clone(&self.state),
            next: 0,
            scratch: Vec::new(),
        }))
    }
}

struct SimPcm {
    config: PcmConfig,
    direction: Direction,
    state: Arc<Mutex<SimState>>,
    next: i16,
    scratch: Vec<i16>,
}

impl Pcm for SimPcm {
    fn config(&self) -> &PcmConfig {
        &self.config
    }

    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
        let mut state = self.state.lock();
        if let Some(result) = state.reads.pop_front() {
            result?;
        }

        let channels = usize::from(self.config.channels.max(1));
        let samples = data.len() / self.config.format.bytes_per_sample();
        self.scratch.clear();
        for i in 0..samples {
            let sample = if i % channels == 0 {
                self.next
            } else {
                self.next.wrapping_neg()
            };
            self.scratch.push(sample);
            if i % channels == channels - 1 {
                self.next = self.next.wrapping_add(1);
            }
        }
        let mut encoded = Vec::with_capacity(data.len());
        encode_from_i16(&self.scratch, self.config.format, &mut encoded);
        data[..encoded.len()].copy_from_slice(&encoded);

        state.events.push(SimEvent::Read { bytes: data.len() });
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PcmError> {
        let mut state = self.state.lock();
        if let Some(result) = state.writes.pop_front() {
            result?;
        }
        state.last_write = data.to_vec();
        state.bytes_written += data.len();
        state.events.push(SimEvent::Wrote { bytes: data.len() });
        Ok(())
    }

    fn avail(&mut self) -> Result<(usize, Instant), PcmError> {
        let scripted = self.state.lock().avail.pop_front();
        let free = scripted.unwrap_or(Ok(self.config.buffer_frames()))?;
        Ok((free, Instant::now()))
    }
}

impl Drop for SimPcm {
    fn drop(&mut self) {
        self.state.lock().events.push(SimEvent::Closed {
            direction: self.direction,
        });
    }
}
