//! pcmhal Core - data model and device capabilities for the audio data path
//!
//! This crate holds everything the stream engines share but that does not
//! itself move audio: routing masks, PCM parameter sets, sample encodings,
//! and the traits behind which hardware and DSP capabilities sit.
//!
//! # Core Abstractions
//!
//! ## Routing
//!
//! - [`OutputRoute`] / [`InputRoute`] - Device bitmasks and their categories
//! - [`RouteSlot`] - Category used for card selection and configuration
//! - [`mixer_paths`] - Mixer path names for a pair of routes
//!
//! ## Devices
//!
//! - [`PcmConfig`] - Requested / negotiated hardware parameters
//! - [`Pcm`] - An open device session
//! - [`PcmDriver`] - Opens sessions on concrete cards
//! - [`DeviceLookup`] - Maps logical devices and routes to cards
//! - [`Mixer`] - Hardware mixer path application
//! - [`Clock`] - Blocking sleeps used for backpressure
//!
//! ## Conversion
//!
//! - [`SampleFormat`] - Physical encodings (S16LE, S32LE, 8-bit)
//! - [`Resampler`] / [`BufferProvider`] - Push and pull sample-rate conversion
//! - [`LinearResampler`] - Built-in drift-free linear resampler
//! - [`rates_conflict`] - Clock-domain exclusion between open sessions
//!
//! ## Preprocessing
//!
//! - [`PreProcessor`] - 10 ms chunk capture effect
//! - [`DcRemover`] - Integer DC-offset removal
//!
//! # Example
//!
//! ```rust
//! use pcmhal_core::{LinearResampler, Resampler};
//!
//! let mut rs = LinearResampler::new(48000, 44100, 2).unwrap();
//! let input = vec![0i16; 512 * 2];
//! let mut output = vec![0i16; 471 * 2];
//! let (consumed, produced) = rs.resample_from_input(&input, &mut output);
//! assert_eq!((consumed, produced), (512, 471));
//! ```

pub mod clock;
pub mod effect;
pub mod format;
pub mod mixer;
pub mod pcm;
pub mod rate;
pub mod resample;
pub mod route;
pub mod stream;

pub use clock::{Clock, SystemClock, transfer_time};
pub use effect::{ChunkResult, DcRemover, EffectId, PreProcessor};
pub use format::{
    SampleFormat, UnknownFormat, decode_to_i16, encode_from_i16, keep_first_channel,
    keep_first_channel_in_place,
};
pub use mixer::Mixer;
pub use pcm::{
    DeviceLookup, FALLBACK_RATE, IN_PERIOD_COUNT, IN_PERIOD_SIZE, IN_SAMPLING_RATE,
    OUT_LONG_PERIOD_COUNT, OUT_PERIOD_SIZE, OUT_SAMPLING_RATE, OUT_SHORT_PERIOD_COUNT, Pcm,
    PcmConfig, PcmDevice, PcmDriver, PcmError, PcmInfo, SCO_PERIOD_COUNT, SCO_PERIOD_SIZE,
    SCO_SAMPLING_RATE,
};
pub use rate::{RateFamily, rates_conflict};
pub use resample::{
    BufferProvider, LinearResampler, LinearResamplerFactory, Resampler, ResamplerError,
    ResamplerFactory, ResamplerQuality,
};
pub use route::{Direction, InputRoute, OutputRoute, RouteSlot, mixer_paths};
pub use stream::{AudioConfig, AudioFormat, ChannelLayout};
