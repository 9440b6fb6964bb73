//! Playback stream engine.
//!
//! An [`OutputStream`] is in standby until the first write opens a session on
//! the card selected for the current route. Each write then runs the
//! conversion chain:
//!
//! ```text
//! caller (48 kHz stereo i16)
//!   -> first channel only       (mono device)
//!   -> resample                 (device rate != 48 kHz)
//!   -> pace                     (not on SCO)
//!   -> encode                   (S32LE / U8 device)
//!   -> device write
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

use pcmhal_core::{
    AudioConfig, AudioFormat, ChannelLayout, Clock, Direction, OUT_LONG_PERIOD_COUNT,
    OUT_PERIOD_SIZE, OUT_SAMPLING_RATE, OUT_SHORT_PERIOD_COUNT, OutputRoute, Pcm, PcmConfig,
    PcmDevice, PcmError, Resampler, encode_from_i16, keep_first_channel,
    rates_conflict, transfer_time,
};

use crate::device::{DeviceState, HwShared};
use crate::pacing::{Disposition, PacingSnapshot, WritePacer};
use crate::{Error, Result};

/// Bytes per caller frame (stereo, 16-bit).
const FRAME_BYTES: usize = 4;

/// An open playback session and its conversion scratch.
pub(crate) struct OutputSession {
    pcm: Box<dyn Pcm>,
    config: PcmConfig,
    sco: bool,
    resampler: Option<Box<dyn Resampler>>,
    mono: Vec<i16>,
    resampled: Vec<i16>,
    encoded: Vec<u8>,
    pacer: WritePacer,
}

impl OutputSession {
    fn write(
        &mut self,
        samples: &[i16],
        disposition: Disposition,
        clock: &dyn Clock,
    ) -> std::result::Result<(), PcmError> {
        if !self.sco {
            self.pacer.set_disposition(disposition);
        }

        let channels = usize::from(self.config.channels.max(1));
        let mut frames: &[i16] = samples;
        if channels == 1 {
            keep_first_channel(samples, &mut self.mono);
            frames = &self.mono;
        }

        if let Some(resampler) = self.resampler.as_mut() {
            let in_frames = frames.len() / channels;
            let needed =
                (in_frames * self.config.rate as usize / OUT_SAMPLING_RATE as usize + 1) * channels;
            if self.resampled.len() < needed {
                self.resampled.resize(needed, 0);
            }
            let (_, produced) = resampler.resample_from_input(frames, &mut self.resampled);
            frames = &self.resampled[..produced * channels];
        }

        if !self.sco {
            let ring = self.pcm.buffer_frames();
            let pcm = &mut self.pcm;
            let kernel = self.pacer.pace(self.config.rate, clock, || {
                pcm.avail().ok().map(|(free, _)| ring.saturating_sub(free))
            });
            self.pacer.converge(kernel);
        }

        encode_from_i16(frames, self.config.format, &mut self.encoded);
        self.pcm.write(&self.encoded)
    }
}

/// Per-stream state behind the stream lock.
#[derive(Default)]
pub(crate) struct OutputCore {
    session: Option<OutputSession>,
}

impl OutputCore {
    /// Rate of the open session.
    pub(crate) fn device_rate(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.config.rate)
    }

    /// Close the session. Returns true when one was open.
    pub(crate) fn standby(&mut self) -> bool {
        self.session.take().is_some()
    }
}

/// Open a playback session for the current route and register it.
fn start(
    hw: &HwShared,
    state: &mut DeviceState,
    core: &mut OutputCore,
    handle: &Arc<Mutex<OutputCore>>,
) -> Result<()> {
    let route = state.out_route;
    let (device, mut config) = if route.is_sco() {
        (PcmDevice::Sco, PcmConfig::SCO)
    } else if route.aux_digital() {
        (PcmDevice::Hdmi, PcmConfig::OUTPUT)
    } else {
        (PcmDevice::Main, PcmConfig::OUTPUT)
    };

    if let Some(input) = state.active_in.clone() {
        let in_rate = input.lock().device_rate();
        if let Some(in_rate) = in_rate
            && rates_conflict(config.rate, in_rate)
        {
            tracing::info!(
                out_rate = config.rate,
                in_rate,
                "rate families conflict, putting input in standby"
            );
            state.standby_input(&input);
        }
    }

    let pcm = hw.open_pcm(device, Direction::Output, route.bits(), &mut config)?;
    let config = *pcm.config();
    let channels = usize::from(config.channels.max(1));

    let resampler = if config.rate == OUT_SAMPLING_RATE {
        None
    } else {
        Some(hw.create_resampler(OUT_SAMPLING_RATE, config.rate, channels)?)
    };
    let resampled = if resampler.is_some() {
        vec![0; (OUT_PERIOD_SIZE * config.rate as usize / OUT_SAMPLING_RATE as usize + 1) * channels]
    } else {
        Vec::new()
    };

    core.session = Some(OutputSession {
        pcm,
        config,
        sco: route.is_sco(),
        resampler,
        mono: Vec::new(),
        resampled,
        encoded: Vec::new(),
        pacer: WritePacer::new(config.period_size),
    });
    state.active_out = Some(Arc::clone(handle));
    tracing::info!(
        %route,
        rate = config.rate,
        channels = config.channels,
        "output stream started"
    );
    Ok(())
}

/// A playback stream. Always 48 kHz stereo 16-bit on the caller side.
///
/// Dropping the stream puts it in standby.
pub struct OutputStream {
    hw: Arc<HwShared>,
    core: Arc<Mutex<OutputCore>>,
}

impl OutputStream {
    pub(crate) fn new(hw: Arc<HwShared>) -> Self {
        Self {
            hw,
            core: Arc::new(Mutex::new(OutputCore::default())),
        }
    }

    /// Write interleaved stereo frames, blocking as pacing requires.
    ///
    /// Returns the bytes consumed. Device faults other than an underrun are
    /// absorbed: the call sleeps for the buffer's play-out time and still
    /// reports the whole buffer as written, so the caller keeps its cadence.
    pub fn write(&self, samples: &[i16]) -> Result<usize> {
        let bytes = samples.len() * 2;
        let mut state = self.hw.state.lock();
        let mut core = self.core.lock();

        if core.session.is_none()
            && let Err(err) = start(&self.hw, &mut state, &mut core, &self.core)
        {
            drop(core);
            drop(state);
            tracing::warn!(%err, "output start failed");
            self.hw
                .clock
                .sleep(transfer_time(bytes, FRAME_BYTES, OUT_SAMPLING_RATE));
            return Ok(bytes);
        }

        let disposition = Disposition::choose(state.screen_off, state.active_in.is_some());
        drop(state);

        let Some(session) = core.session.as_mut() else {
            return Ok(bytes);
        };
        match session.write(samples, disposition, self.hw.clock.as_ref()) {
            Ok(()) => Ok(bytes),
            Err(PcmError::Underrun) => {
                tracing::debug!("playback underrun");
                Err(Error::Underrun)
            }
            Err(err) => {
                drop(core);
                tracing::warn!(%err, "output write failed");
                self.hw
                    .clock
                    .sleep(transfer_time(bytes, FRAME_BYTES, OUT_SAMPLING_RATE));
                Ok(bytes)
            }
        }
    }

    /// Close the session; the next write reopens it.
    pub fn standby(&self) {
        let mut state = self.hw.state.lock();
        state.standby_output(&self.core);
    }

    /// True when no session is open.
    pub fn is_standby(&self) -> bool {
        self.core.lock().session.is_none()
    }

    /// Apply stream parameters (`routing=<mask>`). Unknown keys are ignored.
    pub fn set_parameters(&self, kvpairs: &str) {
        let parms = pcmhal_config::StrParms::parse(kvpairs);
        if let Some(bits) = parms.get_int("routing") {
            self.hw.route_output(bits as u32, Some(&self.core));
        }
    }

    /// Caller-side sample rate.
    pub fn sample_rate(&self) -> u32 {
        OUT_SAMPLING_RATE
    }

    /// Output streams are fixed at 48 kHz.
    pub fn set_sample_rate(&self, _rate: u32) -> Result<()> {
        Err(Error::Unsupported("output sample rate is fixed"))
    }

    /// Caller-side channel layout.
    pub fn channels(&self) -> ChannelLayout {
        ChannelLayout::Stereo
    }

    /// Caller-side sample format.
    pub fn format(&self) -> AudioFormat {
        AudioFormat::Pcm16
    }

    /// Output streams only accept 16-bit PCM.
    pub fn set_format(&self, _format: AudioFormat) -> Result<()> {
        Err(Error::Unsupported("output format is fixed"))
    }

    /// Caller-side configuration.
    pub fn config(&self) -> AudioConfig {
        AudioConfig::new(OUT_SAMPLING_RATE, ChannelLayout::Stereo)
    }

    /// Preferred write size in bytes: one device period.
    pub fn buffer_size(&self) -> usize {
        OUT_PERIOD_SIZE * FRAME_BYTES
    }

    /// Worst-case latency in milliseconds for the current conditions.
    pub fn latency_ms(&self) -> u32 {
        let state = self.hw.state.lock();
        let long = state.screen_off && state.active_in.is_none() && !state.out_route.is_sco();
        let count = if long {
            OUT_LONG_PERIOD_COUNT
        } else {
            OUT_SHORT_PERIOD_COUNT
        };
        (OUT_PERIOD_SIZE * count * 1000 / OUT_SAMPLING_RATE as usize) as u32
    }

    /// Pacing state of the open session.
    pub fn pacing_snapshot(&self) -> Option<PacingSnapshot> {
        self.core.lock().session.as_ref().map(|s| s.pacer.snapshot())
    }

    /// Negotiated device parameters of the open session.
    pub fn device_config(&self) -> Option<PcmConfig> {
        self.core.lock().session.as_ref().map(|s| s.config)
    }

    /// Route the stream would start on now.
    pub fn route(&self) -> OutputRoute {
        self.hw.state.lock().out_route
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.standby();
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("standby", &self.is_standby())
            .finish_non_exhaustive()
    }
}
