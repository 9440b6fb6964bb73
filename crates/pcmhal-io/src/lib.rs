//! Stream engines and device coordination for the pcmhal data path.
//!
//! This crate provides:
//!
//! - **Coordinator**: [`AudioHw`] owns the routing state, the mixer and the
//!   registry of active sessions, and opens streams
//! - **Playback**: [`OutputStream`] with channel reduction, resampling,
//!   format conversion and adaptive write pacing ([`WritePacer`])
//! - **Capture**: [`InputStream`] with pull-mode resampling and an optional
//!   10 ms preprocessing chain ([`PreprocessPipeline`])
//! - **Card selection**: [`CardSelector`] with a memoized category cache,
//!   configured overrides and serialized bring-up commands
//! - **Backends**: [`CpalDriver`] for real devices, [`SimDriver`] for
//!   deterministic simulation
//! - **WAV file I/O**: [`read_wav_i16`] and [`write_wav_i16`]
//!
//! ## Quick Start
//!
//! ```rust
//! use pcmhal_core::AudioConfig;
//! use pcmhal_io::{AudioHw, SimDriver, StaticCards};
//! use std::sync::Arc;
//!
//! let sim = SimDriver::new();
//! let hw = AudioHw::builder()
//!     .driver(Arc::new(sim.clone()))
//!     .enumerator(Arc::new(StaticCards::single(0)))
//!     .build();
//!
//! let mut config = AudioConfig::default();
//! let out = hw.open_output_stream(&mut config).unwrap();
//! let written = out.write(&vec![0i16; 1024]).unwrap();
//! assert_eq!(written, 2048);
//! assert_eq!(sim.bytes_written(), 2048);
//! ```

mod bridge;
mod cpal_driver;
mod device;
mod enumerate;
mod input;
mod mixer;
mod output;
mod pacing;
mod preprocess;
mod select;
mod sim;
mod wav;

pub use bridge::{CaptureBuffer, PcmBridge};
pub use cpal_driver::CpalDriver;
pub use device::{AudioHw, AudioHwBuilder};
pub use enumerate::{CardEnumerator, ProcAsound, StaticCards};
pub use input::InputStream;
pub use mixer::TracingMixer;
pub use output::OutputStream;
pub use pacing::{
    Disposition, MAX_PACING_SLEEP, MIN_PACING_SLEEP, PacingSnapshot, WritePacer,
};
pub use preprocess::{MAX_PREPROCESSORS, PreprocessPipeline};
pub use select::{BringUp, CardSelector};
pub use sim::{SimDriver, SimEvent};
pub use wav::{WavInfo, read_wav_i16, read_wav_info, write_wav_i16};

use pcmhal_core::{AudioConfig, EffectId, PcmError};

/// Error types for the stream engines and the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No card matches the current route.
    #[error("No sound card for the current route")]
    NoDevice,

    /// The device refused to open, even at the fallback rate.
    #[error("Device could not be opened")]
    OutOfResources,

    /// The operation is not supported by this stream.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The requested stream configuration cannot be honored; retry with
    /// the suggested one.
    #[error("Unsupported stream configuration, suggested {suggested:?}")]
    ConfigConflict {
        /// Configuration the caller should retry with.
        suggested: AudioConfig,
    },

    /// Playback ran dry; the caller should write again immediately.
    #[error("Playback underrun")]
    Underrun,

    /// The preprocessing chain is full.
    #[error("Preprocessing chain is full ({MAX_PREPROCESSORS} effects)")]
    EffectCapacity,

    /// Remove was requested on an empty preprocessing chain.
    #[error("No preprocessing effects attached")]
    NoEffects,

    /// The effect is not attached to this stream.
    #[error("Effect {0:?} is not attached")]
    EffectNotFound(EffectId),

    /// Device session fault.
    #[error("PCM error: {0}")]
    Pcm(#[from] PcmError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] pcmhal_config::ConfigError),

    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio backend setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for the stream engines.
pub type Result<T> = std::result::Result<T, Error>;
