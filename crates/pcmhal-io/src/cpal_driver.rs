//! cpal-backed [`PcmDriver`].
//!
//! cpal is callback driven while the engines expect blocking transfers, so
//! each session puts a bounded sample queue between the two:
//!
//! - playback: [`Pcm::write`] decodes the device bytes back to samples and
//!   blocks while the queue holds a full ring; the output callback drains
//!   it and plays silence (flagging an underrun) when it runs dry.
//! - capture: the input callback fills the queue, dropping the oldest
//!   samples on overflow; [`Pcm::read`] blocks until a full buffer is queued.
//!
//! The queue capacity is the ring size of the requested [`PcmConfig`], so
//! [`Pcm::avail`] reports the same free space a hardware ring would.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pcmhal_core::{
    Direction, Pcm, PcmConfig, PcmDriver, PcmError, PcmInfo, decode_to_i16, encode_from_i16,
};

use crate::{Error, Result};

/// How long a blocked transfer waits for the callback before giving up.
const TRANSFER_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens sessions on the default cpal host.
#[derive(Debug, Default)]
pub struct CpalDriver;

impl CpalDriver {
    /// Driver over the default host.
    pub fn new() -> Self {
        tracing::info!(
            host = cpal::default_host().id().name(),
            "cpal driver initialized"
        );
        Self
    }

    /// Names of the devices available in `direction`.
    pub fn device_names(&self, direction: Direction) -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = match direction {
            Direction::Output => host.output_devices(),
            Direction::Input => host.input_devices(),
        }
        .map_err(|e| Error::Stream(e.to_string()))?;
        Ok(devices.filter_map(|d| device_name(&d)).collect())
    }

    fn find_device(info: &PcmInfo, direction: Direction) -> Option<cpal::Device> {
        let host = cpal::default_host();
        let search = info.name.to_lowercase();
        let devices = match direction {
            Direction::Output => host.output_devices(),
            Direction::Input => host.input_devices(),
        };
        if let Ok(devices) = devices {
            for device in devices {
                if device_name(&device).is_some_and(|name| name.to_lowercase().contains(&search)) {
                    return Some(device);
                }
            }
        }
        match direction {
            Direction::Output => host.default_output_device(),
            Direction::Input => host.default_input_device(),
        }
    }
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

struct Queue {
    samples: Mutex<VecDeque<i16>>,
    ready: Condvar,
    capacity: usize,
    xrun: AtomicBool,
    started: AtomicBool,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
            xrun: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }
}

impl PcmDriver for CpalDriver {
    fn open(
        &self,
        info: &PcmInfo,
        direction: Direction,
        config: &PcmConfig,
    ) -> std::result::Result<Box<dyn Pcm>, PcmError> {
        let device = Self::find_device(info, direction).ok_or(PcmError::Closed)?;
        let channels = usize::from(config.channels.max(1));
        let queue = Arc::new(Queue::new(config.buffer_frames() * channels));

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.rate,
            buffer_size: cpal::BufferSize::Fixed(config.period_size as u32),
        };

        let callback_queue = Arc::clone(&queue);
        let on_error = |err: cpal::StreamError| {
            tracing::warn!(%err, "cpal stream error");
        };
        let stream = match direction {
            Direction::Output => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut samples = callback_queue.samples.lock();
                    let started = callback_queue.started.load(Ordering::Relaxed);
                    for out in data.iter_mut() {
                        *out = match samples.pop_front() {
                            Some(s) => f32::from(s) / 32768.0,
                            None => {
                                if started {
                                    callback_queue.xrun.store(true, Ordering::Relaxed);
                                }
                                0.0
                            }
                        };
                    }
                    drop(samples);
                    callback_queue.ready.notify_all();
                },
                on_error,
                None,
            ),
            Direction::Input => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut samples = callback_queue.samples.lock();
                    for &s in data {
                        if samples.len() >= callback_queue.capacity {
                            samples.pop_front();
                            callback_queue.xrun.store(true, Ordering::Relaxed);
                        }
                        samples.push_back((s.clamp(-1.0, 1.0) * 32767.0) as i16);
                    }
                    drop(samples);
                    callback_queue.ready.notify_all();
                },
                on_error,
                None,
            ),
        }
        .map_err(|e| PcmError::NotReady(e.to_string()))?;

        stream.play().map_err(|e| PcmError::NotReady(e.to_string()))?;
        tracing::info!(
            device = device_name(&device).unwrap_or_default(),
            direction = direction.as_str(),
            channels = config.channels,
            sample_rate = config.rate,
            "cpal stream started"
        );

        Ok(Box::new(CpalPcm {
            config: *config,
            queue,
            scratch: Vec::new(),
            encoded: Vec::new(),
            _stream: stream,
        }))
    }
}

struct CpalPcm {
    config: PcmConfig,
    queue: Arc<Queue>,
    scratch: Vec<i16>,
    encoded: Vec<u8>,
    _stream: cpal::Stream,
}

impl Pcm for CpalPcm {
    fn config(&self) -> &PcmConfig {
        &self.config
    }

    fn read(&mut self, data: &mut [u8]) -> std::result::Result<(), PcmError> {
        let needed = data.len() / self.config.format.bytes_per_sample();
        let mut samples = self.queue.samples.lock();
        while samples.len() < needed {
            if self
                .queue
                .ready
                .wait_for(&mut samples, TRANSFER_TIMEOUT)
                .timed_out()
            {
                return Err(PcmError::Io("capture stalled".into()));
            }
        }
        self.scratch.clear();
        self.scratch.extend(samples.drain(..needed));
        drop(samples);

        if self.queue.xrun.swap(false, Ordering::Relaxed) {
            tracing::debug!("capture overrun");
        }
        encode_from_i16(&self.scratch, self.config.format, &mut self.encoded);
        data[..self.encoded.len()].copy_from_slice(&self.encoded);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> std::result::Result<(), PcmError> {
        let count = data.len() / self.config.format.bytes_per_sample();
        self.scratch.resize(count, 0);
        decode_to_i16(data, self.config.format, &mut self.scratch);

        let mut pending: &[i16] = &self.scratch;
        let mut samples = self.queue.samples.lock();
        while !pending.is_empty() {
            let room = self.queue.capacity.saturating_sub(samples.len());
            if room == 0 {
                if self
                    .queue
                    .ready
                    .wait_for(&mut samples, TRANSFER_TIMEOUT)
                    .timed_out()
                {
                    return Err(PcmError::Io("playback stalled".into()));
                }
                continue;
            }
            let take = room.min(pending.len());
            samples.extend(&pending[..take]);
            pending = &pending[take..];
        }
        drop(samples);

        let queued_before = self.queue.started.swap(true, Ordering::Relaxed);
        if queued_before && self.queue.xrun.swap(false, Ordering::Relaxed) {
            return Err(PcmError::Underrun);
        }
        Ok(())
    }

    fn avail(&mut self) -> std::result::Result<(usize, Instant), PcmError> {
        let queued = self.queue.samples.lock().len();
        let channels = usize::from(self.config.channels.max(1));
        let free = self.queue.capacity.saturating_sub(queued) / channels;
        Ok((free, Instant::now()))
    }
}
