//! Device-wide routing state and stream factory.
//!
//! [`AudioHw`] is the coordinator both stream engines consult. It owns:
//!
//! - the current output and input routes and the mixer they drive
//! - the screen state and microphone mute flag
//! - the registry of the (at most one per direction) active sessions
//! - the capability objects sessions are opened through
//!
//! # Locking
//!
//! The coordinator state is behind one mutex and each stream core behind its
//! own. Whenever both are needed the coordinator lock is taken first. Stream
//! engines drop the coordinator lock before pacing or reading, so a blocked
//! device never stalls routing changes on the other direction.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pcmhal_config::{HalConfig, StrParms};
use pcmhal_core::{
    AudioConfig, ChannelLayout, Clock, DeviceLookup, Direction, FALLBACK_RATE, IN_PERIOD_SIZE,
    IN_SAMPLING_RATE, InputRoute, LinearResamplerFactory, Mixer, OUT_SAMPLING_RATE,
    OutputRoute, Pcm, PcmConfig, PcmDevice, PcmDriver, Resampler, ResamplerFactory,
    ResamplerQuality, SystemClock,
    mixer_paths,
};

use crate::enumerate::{CardEnumerator, ProcAsound};
use crate::input::{InputCore, InputStream};
use crate::mixer::TracingMixer;
use crate::output::{OutputCore, OutputStream};
use crate::select::CardSelector;
use crate::{CpalDriver, Error, Result};

/// Routing and session registry, guarded by the coordinator lock.
pub(crate) struct DeviceState {
    pub(crate) out_route: OutputRoute,
    pub(crate) in_route: InputRoute,
    pub(crate) screen_off: bool,
    mixer: Box<dyn Mixer>,
    pub(crate) active_out: Option<Arc<Mutex<OutputCore>>>,
    pub(crate) active_in: Option<Arc<Mutex<InputCore>>>,
}

impl DeviceState {
    /// Push the mixer paths for the current routes.
    fn apply_routes(&mut self) {
        self.mixer.reset();
        for path in mixer_paths(self.out_route, self.in_route) {
            self.mixer.apply_path(path);
        }
        self.mixer.commit();
    }

    /// Put an output core in standby and drop its registration if it is the
    /// active one.
    pub(crate) fn standby_output(&mut self, core: &Arc<Mutex<OutputCore>>) {
        if core.lock().standby() {
            tracing::debug!("output entered standby");
        }
        if self
            .active_out
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, core))
        {
            self.active_out = None;
        }
    }

    /// Input counterpart of [`standby_output`](Self::standby_output).
    pub(crate) fn standby_input(&mut self, core: &Arc<Mutex<InputCore>>) {
        if core.lock().standby() {
            tracing::debug!("input entered standby");
        }
        if self
            .active_in
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, core))
        {
            self.active_in = None;
        }
    }
}

/// State shared by the coordinator and every stream it opened.
pub(crate) struct HwShared {
    pub(crate) state: Mutex<DeviceState>,
    mic_mute: AtomicBool,
    driver: Arc<dyn PcmDriver>,
    lookup: Arc<dyn DeviceLookup>,
    resamplers: Arc<dyn ResamplerFactory>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl HwShared {
    pub(crate) fn mic_muted(&self) -> bool {
        self.mic_mute.load(Ordering::Relaxed)
    }

    /// Select, prepare and open a session.
    ///
    /// A missing card is reported immediately. A refused open is retried
    /// once at the fallback rate; `config` holds what was last requested.
    pub(crate) fn open_pcm(
        &self,
        device: PcmDevice,
        direction: Direction,
        route: u32,
        config: &mut PcmConfig,
    ) -> Result<Box<dyn Pcm>> {
        let Some(info) = self.lookup.select(device, direction, route) else {
            tracing::error!(
                direction = direction.as_str(),
                route = %format!("{route:#x}"),
                "unable to find a sound card"
            );
            return Err(Error::NoDevice);
        };

        self.lookup.prepare(direction, route, config);

        match self.driver.open(&info, direction, config) {
            Ok(pcm) => {
                tracing::info!(
                    node = %info.node_name(),
                    rate = config.rate,
                    channels = config.channels,
                    format = %config.format,
                    "pcm opened"
                );
                Ok(pcm)
            }
            Err(err) => {
                tracing::warn!(
                    node = %info.node_name(),
                    rate = config.rate,
                    %err,
                    "pcm open failed, retrying at fallback rate"
                );
                config.rate = FALLBACK_RATE;
                self.driver.open(&info, direction, config).map_err(|err| {
                    tracing::error!(node = %info.node_name(), %err, "pcm open failed");
                    Error::OutOfResources
                })
            }
        }
    }

    /// Create a resampler for a session, reporting any failure as
    /// [`Error::OutOfResources`].
    pub(crate) fn create_resampler(
        &self,
        in_rate: u32,
        out_rate: u32,
        channels: usize,
    ) -> Result<Box<dyn Resampler>> {
        self.resamplers
            .create(in_rate, out_rate, channels, ResamplerQuality::Default)
            .map_err(|err| {
                tracing::error!(in_rate, out_rate, channels, %err, "resampler unavailable");
                Error::OutOfResources
            })
    }

    /// Apply a new output route on behalf of `stream` (or the active output
    /// when `None`).
    pub(crate) fn route_output(&self, bits: u32, stream: Option<&Arc<Mutex<OutputCore>>>) {
        let route = OutputRoute::new(bits);
        let mut state = self.state.lock();
        if bits == 0 || route == state.out_route {
            return;
        }
        let target = stream.cloned().or_else(|| state.active_out.clone());

        if route.sco_changed(state.out_route)
            && let Some(core) = &target
        {
            state.standby_output(core);
        }

        tracing::info!(from = %state.out_route, to = %route, "output route changed");
        state.out_route = route;
        state.apply_routes();

        // The new route may live on another card.
        if let Some(core) = &target {
            state.standby_output(core);
        }
    }

    /// Apply a new input route; the direction bit is stripped.
    pub(crate) fn route_input(&self, bits: u32, stream: Option<&Arc<Mutex<InputCore>>>) {
        let route = InputRoute::new(bits);
        let mut state = self.state.lock();
        if route.bits() == 0 || route == state.in_route {
            return;
        }
        let target = stream.cloned().or_else(|| state.active_in.clone());

        if route.sco_changed(state.in_route)
            && let Some(core) = &target
        {
            state.standby_input(core);
        }

        tracing::info!(from = %state.in_route, to = %route, "input route changed");
        state.in_route = route;
        state.apply_routes();

        if let Some(core) = &target {
            state.standby_input(core);
        }
    }
}

/// Builder for [`AudioHw`].
///
/// Every capability has a default: the cpal driver, card selection over
/// `/proc/asound/pcm` with an empty configuration, a logging mixer, the
/// linear resampler and real sleeps.
#[derive(Default)]
pub struct AudioHwBuilder {
    driver: Option<Arc<dyn PcmDriver>>,
    lookup: Option<Arc<dyn DeviceLookup>>,
    enumerator: Option<Arc<dyn CardEnumerator>>,
    config: Option<HalConfig>,
    mixer: Option<Box<dyn Mixer>>,
    resamplers: Option<Arc<dyn ResamplerFactory>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AudioHwBuilder {
    /// Device driver sessions are opened through.
    pub fn driver(mut self, driver: Arc<dyn PcmDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Card lookup. Overrides [`enumerator`](Self::enumerator) and
    /// [`config`](Self::config).
    pub fn lookup(mut self, lookup: Arc<dyn DeviceLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Card source for the default [`CardSelector`].
    pub fn enumerator(mut self, enumerator: Arc<dyn CardEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Overrides for the default [`CardSelector`].
    pub fn config(mut self, config: HalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Hardware mixer.
    pub fn mixer(mut self, mixer: Box<dyn Mixer>) -> Self {
        self.mixer = Some(mixer);
        self
    }

    /// Resampler factory.
    pub fn resamplers(mut self, resamplers: Arc<dyn ResamplerFactory>) -> Self {
        self.resamplers = Some(resamplers);
        self
    }

    /// Sleep source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the coordinator with speaker / built-in mic routes.
    pub fn build(self) -> AudioHw {
        let lookup = self.lookup.unwrap_or_else(|| {
            let enumerator = self
                .enumerator
                .unwrap_or_else(|| Arc::new(ProcAsound::default()));
            Arc::new(CardSelector::new(self.config.unwrap_or_default(), enumerator))
        });

        let state = DeviceState {
            out_route: OutputRoute::new(OutputRoute::SPEAKER),
            in_route: InputRoute::new(InputRoute::BUILTIN_MIC),
            screen_off: false,
            mixer: self
                .mixer
                .unwrap_or_else(|| Box::new(TracingMixer::default())),
            active_out: None,
            active_in: None,
        };

        tracing::info!("audio device opened");
        AudioHw {
            shared: Arc::new(HwShared {
                state: Mutex::new(state),
                mic_mute: AtomicBool::new(false),
                driver: self.driver.unwrap_or_else(|| Arc::new(CpalDriver::new())),
                lookup,
                resamplers: self
                    .resamplers
                    .unwrap_or_else(|| Arc::new(LinearResamplerFactory)),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            }),
        }
    }
}

/// The audio device: routing coordinator and stream factory.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AudioHw {
    shared: Arc<HwShared>,
}

impl AudioHw {
    /// Start configuring a device.
    pub fn builder() -> AudioHwBuilder {
        AudioHwBuilder::default()
    }

    /// Apply device-level parameters (`screen_state=on|off`).
    ///
    /// Unknown keys are ignored.
    pub fn set_parameters(&self, kvpairs: &str) {
        let parms = StrParms::parse(kvpairs);
        if let Some(value) = parms.get("screen_state") {
            self.set_screen_off(value != "on");
        }
    }

    /// Record the screen state used to pick the playback disposition.
    pub fn set_screen_off(&self, off: bool) {
        let mut state = self.shared.state.lock();
        if state.screen_off != off {
            tracing::debug!(screen_off = off, "screen state changed");
        }
        state.screen_off = off;
    }

    /// Current screen state.
    pub fn screen_off(&self) -> bool {
        self.shared.state.lock().screen_off
    }

    /// Mute or unmute every capture stream. Capture keeps running; callers
    /// receive silence.
    pub fn set_mic_mute(&self, muted: bool) {
        self.shared.mic_mute.store(muted, Ordering::Relaxed);
    }

    /// Current microphone mute state.
    pub fn mic_mute(&self) -> bool {
        self.shared.mic_muted()
    }

    /// Current output route.
    pub fn output_route(&self) -> OutputRoute {
        self.shared.state.lock().out_route
    }

    /// Current input route.
    pub fn input_route(&self) -> InputRoute {
        self.shared.state.lock().in_route
    }

    /// Change the output route, putting the active output in standby.
    pub fn set_output_route(&self, bits: u32) {
        self.shared.route_output(bits, None);
    }

    /// Change the input route, putting the active input in standby.
    pub fn set_input_route(&self, bits: u32) {
        self.shared.route_input(bits, None);
    }

    /// True when a playback session is open.
    pub fn output_active(&self) -> bool {
        self.shared.state.lock().active_out.is_some()
    }

    /// True when a capture session is open.
    pub fn input_active(&self) -> bool {
        self.shared.state.lock().active_in.is_some()
    }

    /// Capture buffer size in bytes for a stream configuration.
    ///
    /// One device period converted to the stream rate, rounded up to a
    /// multiple of 16 frames.
    pub fn input_buffer_size(&self, config: &AudioConfig) -> usize {
        input_buffer_frames(IN_PERIOD_SIZE, IN_SAMPLING_RATE, config.sample_rate)
            * config.frame_bytes()
    }

    /// Open a playback stream.
    ///
    /// The stream always runs at 48 kHz stereo 16-bit; `config` is rewritten
    /// to say so. Fails when no card serves the current route.
    pub fn open_output_stream(&self, config: &mut AudioConfig) -> Result<OutputStream> {
        let route = self.output_route();
        if self
            .shared
            .lookup
            .select(PcmDevice::Main, Direction::Output, route.bits())
            .is_none()
        {
            tracing::error!(%route, "no playback card for route");
            return Err(Error::NoDevice);
        }
        *config = AudioConfig::new(OUT_SAMPLING_RATE, ChannelLayout::Stereo);
        Ok(OutputStream::new(Arc::clone(&self.shared)))
    }

    /// Open a capture stream at the requested rate.
    ///
    /// Only mono is supported. Any other layout rewrites `config` to mono and
    /// fails with [`Error::ConfigConflict`] so the caller can retry.
    pub fn open_input_stream(&self, config: &mut AudioConfig) -> Result<InputStream> {
        if config.channels != ChannelLayout::Mono {
            config.channels = ChannelLayout::Mono;
            return Err(Error::ConfigConflict { suggested: *config });
        }
        if config.sample_rate == 0 {
            return Err(Error::Unsupported("zero sample rate"));
        }
        Ok(InputStream::new(Arc::clone(&self.shared), config.sample_rate))
    }
}

/// Frames per capture buffer: `period * stream_rate / device_rate` rounded
/// up to a multiple of 16.
pub(crate) fn input_buffer_frames(period: usize, device_rate: u32, stream_rate: u32) -> usize {
    if device_rate == 0 {
        return 0;
    }
    let frames = period * stream_rate as usize / device_rate as usize;
    frames.div_ceil(16) * 16
}
