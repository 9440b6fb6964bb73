//! Capture stream engine.
//!
//! Input streams are mono at whatever rate the caller asked for. The device
//! runs at its own rate (48 kHz, 8 kHz on SCO, or the fallback rate), so
//! reads go through a [`PcmBridge`] and, when the rates differ, a pull-mode
//! resampler. Attached effects run over the result in 10 ms chunks.
//!
//! A read never fails from the caller's point of view: it always reports the
//! whole buffer, and a device fault costs the buffer's capture time in sleep
//! so a tight read loop does not spin.

use parking_lot::Mutex;
use std::sync::Arc;

use pcmhal_core::{
    AudioConfig, AudioFormat, BufferProvider, ChannelLayout, Direction, EffectId,
    IN_PERIOD_SIZE, IN_SAMPLING_RATE, InputRoute, Pcm, PcmConfig, PcmDevice, PcmError,
    PreProcessor, Resampler, rates_conflict, transfer_time,
};

use crate::bridge::{CaptureBuffer, PcmBridge};
use crate::device::{DeviceState, HwShared, input_buffer_frames};
use crate::preprocess::PreprocessPipeline;
use crate::{Error, Result};

/// Bytes per caller frame (mono, 16-bit).
const FRAME_BYTES: usize = 2;

pub(crate) struct InputSession {
    pcm: Box<dyn Pcm>,
    config: PcmConfig,
    resampler: Option<Box<dyn Resampler>>,
    capture: CaptureBuffer,
}

impl InputSession {
    /// Fill `out` with mono frames at the stream rate.
    fn read_frames(&mut self, out: &mut [i16]) -> std::result::Result<usize, PcmError> {
        let mut done = 0;
        while done < out.len() {
            let before = done;
            let mut bridge = PcmBridge::new(self.pcm.as_mut(), &mut self.capture);
            if let Some(resampler) = self.resampler.as_mut() {
                done += resampler.resample_from_provider(&mut bridge, &mut out[done..]);
            } else {
                let copied = match bridge.next_buffer(out.len() - done) {
                    Ok(frames) => {
                        out[done..done + frames.len()].copy_from_slice(frames);
                        frames.len()
                    }
                    Err(_) => 0,
                };
                bridge.release_buffer(copied);
                done += copied;
            }

            if let Some(err) = self.capture.take_status() {
                return Err(err);
            }
            if done == before {
                return Err(PcmError::Stalled);
            }
        }
        Ok(done)
    }
}

/// Per-stream state behind the stream lock.
pub(crate) struct InputCore {
    session: Option<InputSession>,
    pipeline: PreprocessPipeline,
    requested_rate: u32,
}

impl InputCore {
    fn new(requested_rate: u32) -> Self {
        Self {
            session: None,
            pipeline: PreprocessPipeline::new(),
            requested_rate,
        }
    }

    /// Rate of the open session.
    pub(crate) fn device_rate(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.config.rate)
    }

    /// Close the session and free the preprocessing scratch. Returns true
    /// when a session was open.
    pub(crate) fn standby(&mut self) -> bool {
        let was_open = self.session.take().is_some();
        self.pipeline.release_scratch();
        was_open
    }

    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, PcmError> {
        let Some(session) = self.session.as_mut() else {
            return Err(PcmError::Closed);
        };
        if self.pipeline.is_empty() {
            session.read_frames(buf)
        } else {
            self.pipeline
                .process(self.requested_rate, buf, |chunk| session.read_frames(chunk))
        }
    }
}

fn start(
    hw: &HwShared,
    state: &mut DeviceState,
    core: &mut InputCore,
    handle: &Arc<Mutex<InputCore>>,
) -> Result<()> {
    let route = state.in_route;
    let (device, mut config) = if route.is_sco() {
        (PcmDevice::Sco, PcmConfig::SCO)
    } else {
        (PcmDevice::Main, PcmConfig::INPUT)
    };

    if let Some(output) = state.active_out.clone() {
        let out_rate = output.lock().device_rate();
        if let Some(out_rate) = out_rate
            && rates_conflict(config.rate, out_rate)
        {
            tracing::info!(
                in_rate = config.rate,
                out_rate,
                "rate families conflict, putting output in standby"
            );
            state.standby_output(&output);
        }
    }

    let pcm = hw.open_pcm(device, Direction::Input, route.bits(), &mut config)?;
    let config = *pcm.config();

    let resampler = if config.rate == core.requested_rate {
        None
    } else {
        Some(hw.create_resampler(config.rate, core.requested_rate, 1)?)
    };

    core.session = Some(InputSession {
        capture: CaptureBuffer::new(&config),
        pcm,
        config,
        resampler,
    });
    state.active_in = Some(Arc::clone(handle));
    tracing::info!(
        %route,
        device_rate = config.rate,
        stream_rate = core.requested_rate,
        "input stream started"
    );
    Ok(())
}

/// A capture stream. Mono 16-bit at the rate requested at open.
///
/// Dropping the stream puts it in standby.
pub struct InputStream {
    hw: Arc<HwShared>,
    core: Arc<Mutex<InputCore>>,
    rate: u32,
}

impl InputStream {
    pub(crate) fn new(hw: Arc<HwShared>, rate: u32) -> Self {
        Self {
            hw,
            core: Arc::new(Mutex::new(InputCore::new(rate))),
            rate,
        }
    }

    /// Fill `buf` with captured mono frames.
    ///
    /// Always returns `buf.len() * 2`. With the microphone muted the buffer
    /// is zeroed after a successful read. On any failure the contents are
    /// unspecified and the call sleeps for the buffer's capture time.
    pub fn read(&self, buf: &mut [i16]) -> usize {
        let bytes = buf.len() * FRAME_BYTES;
        let mut state = self.hw.state.lock();
        let mut core = self.core.lock();

        let started = if core.session.is_none() {
            start(&self.hw, &mut state, &mut core, &self.core)
        } else {
            Ok(())
        };
        drop(state);

        let result = started.and_then(|()| core.read(buf).map_err(Error::from));
        match result {
            Ok(_) => {
                if self.hw.mic_muted() {
                    buf.fill(0);
                }
            }
            Err(err) => {
                drop(core);
                tracing::warn!(%err, "input read failed");
                self.hw
                    .clock
                    .sleep(transfer_time(bytes, FRAME_BYTES, self.rate));
            }
        }
        bytes
    }

    /// Close the session; the next read reopens it.
    pub fn standby(&self) {
        let mut state = self.hw.state.lock();
        state.standby_input(&self.core);
    }

    /// True when no session is open.
    pub fn is_standby(&self) -> bool {
        self.core.lock().session.is_none()
    }

    /// Apply stream parameters (`routing=<mask>`). Unknown keys are ignored.
    pub fn set_parameters(&self, kvpairs: &str) {
        let parms = pcmhal_config::StrParms::parse(kvpairs);
        if let Some(bits) = parms.get_int("routing") {
            self.hw.route_input(bits as u32, Some(&self.core));
        }
    }

    /// Attach a preprocessing effect at the end of the chain.
    pub fn add_effect(&self, effect: Box<dyn PreProcessor>) -> Result<EffectId> {
        self.core.lock().pipeline.add(effect)
    }

    /// Detach a preprocessing effect.
    pub fn remove_effect(&self, id: EffectId) -> Result<()> {
        self.core.lock().pipeline.remove(id).map(drop)
    }

    /// Attached effect count.
    pub fn effect_count(&self) -> usize {
        self.core.lock().pipeline.len()
    }

    /// Caller-side sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.rate
    }

    /// The stream rate is fixed at open.
    pub fn set_sample_rate(&self, _rate: u32) -> Result<()> {
        Err(Error::Unsupported("input sample rate is fixed at open"))
    }

    /// Caller-side channel layout.
    pub fn channels(&self) -> ChannelLayout {
        ChannelLayout::Mono
    }

    /// Caller-side sample format.
    pub fn format(&self) -> AudioFormat {
        AudioFormat::Pcm16
    }

    /// Input streams only deliver 16-bit PCM.
    pub fn set_format(&self, _format: AudioFormat) -> Result<()> {
        Err(Error::Unsupported("input format is fixed"))
    }

    /// Caller-side configuration.
    pub fn config(&self) -> AudioConfig {
        AudioConfig::new(self.rate, ChannelLayout::Mono)
    }

    /// Preferred read size in bytes: one device period at the stream rate,
    /// rounded up to 16 frames.
    pub fn buffer_size(&self) -> usize {
        let (period, device_rate) = self
            .device_config()
            .map_or((IN_PERIOD_SIZE, IN_SAMPLING_RATE), |c| (c.period_size, c.rate));
        input_buffer_frames(period, device_rate, self.rate) * FRAME_BYTES
    }

    /// Frames dropped by the device. Overruns are not tracked.
    pub fn frames_lost(&self) -> u32 {
        0
    }

    /// Negotiated device parameters of the open session.
    pub fn device_config(&self) -> Option<PcmConfig> {
        self.core.lock().session.as_ref().map(|s| s.config)
    }

    /// Route the stream would start on now.
    pub fn route(&self) -> InputRoute {
        self.hw.state.lock().in_route
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.standby();
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("rate", &self.rate)
            .field("standby", &self.is_standby())
            .finish_non_exhaustive()
    }
}
