//! PCM device sessions and the capability traits that produce them.
//!
//! The engines never talk to hardware directly. They go through three seams:
//!
//! - [`DeviceLookup`] maps a logical device plus route mask to a concrete
//!   [`PcmInfo`] and may adjust the requested [`PcmConfig`] before opening.
//! - [`PcmDriver`] opens a [`Pcm`] session on that card.
//! - [`Pcm`] performs blocking reads and writes and reports how much of the
//!   hardware ring is free.
//!
//! Closing a session is dropping it.

use crate::format::SampleFormat;
use crate::route::Direction;
use std::time::Instant;

/// Negotiated or requested PCM parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Frames per hardware period.
    pub period_size: usize,
    /// Periods in the hardware ring.
    pub period_count: usize,
    /// Physical sample encoding.
    pub format: SampleFormat,
    /// Frames queued before playback starts (0 = driver default).
    pub start_threshold: usize,
    /// Frames at which the driver stops on xrun (0 = driver default).
    pub stop_threshold: usize,
}

/// Period size of the main playback device.
pub const OUT_PERIOD_SIZE: usize = 512;
/// Periods kept queued when favoring latency.
pub const OUT_SHORT_PERIOD_COUNT: usize = 2;
/// Periods kept queued when favoring power.
pub const OUT_LONG_PERIOD_COUNT: usize = 8;
/// Sample rate of the main playback device and of every output stream.
pub const OUT_SAMPLING_RATE: u32 = 48000;

/// Period size of the main capture device.
pub const IN_PERIOD_SIZE: usize = 1024;
/// Periods in the capture ring.
pub const IN_PERIOD_COUNT: usize = 4;
/// Sample rate of the main capture device.
pub const IN_SAMPLING_RATE: u32 = 48000;

/// Period size of the voice-call device.
pub const SCO_PERIOD_SIZE: usize = 256;
/// Periods in the voice-call ring.
pub const SCO_PERIOD_COUNT: usize = 4;
/// Narrowband voice-call sample rate.
pub const SCO_SAMPLING_RATE: u32 = 8000;

/// Rate tried once more when a device refuses the requested parameters.
pub const FALLBACK_RATE: u32 = 44100;

impl PcmConfig {
    /// Main playback configuration.
    pub const OUTPUT: PcmConfig = PcmConfig {
        channels: 2,
        rate: OUT_SAMPLING_RATE,
        period_size: OUT_PERIOD_SIZE,
        period_count: OUT_LONG_PERIOD_COUNT,
        format: SampleFormat::S16Le,
        start_threshold: OUT_PERIOD_SIZE * OUT_SHORT_PERIOD_COUNT,
        stop_threshold: 0,
    };

    /// Main capture configuration.
    pub const INPUT: PcmConfig = PcmConfig {
        channels: 2,
        rate: IN_SAMPLING_RATE,
        period_size: IN_PERIOD_SIZE,
        period_count: IN_PERIOD_COUNT,
        format: SampleFormat::S16Le,
        start_threshold: 1,
        stop_threshold: IN_PERIOD_SIZE * IN_PERIOD_COUNT,
    };

    /// Voice-call (SCO) configuration, used for both directions.
    pub const SCO: PcmConfig = PcmConfig {
        channels: 1,
        rate: SCO_SAMPLING_RATE,
        period_size: SCO_PERIOD_SIZE,
        period_count: SCO_PERIOD_COUNT,
        format: SampleFormat::S16Le,
        start_threshold: 0,
        stop_threshold: 0,
    };

    /// Bytes per interleaved frame at the physical encoding.
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Frames in the whole hardware ring.
    pub const fn buffer_frames(&self) -> usize {
        self.period_size * self.period_count
    }

    /// Bytes in one period at the physical encoding.
    pub const fn period_bytes(&self) -> usize {
        self.period_size * self.frame_bytes()
    }
}

/// Logical PCM device a stream asks for. Selection maps it to whatever
/// node serves the route; only [`PcmDevice::Hdmi`] changes which card wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmDevice {
    /// Speaker / headphone / dock / microphones.
    Main,
    /// Bluetooth SCO voice path.
    Sco,
    /// Digital audio out.
    Hdmi,
}


/// Identity of a concrete PCM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmInfo {
    /// Card index.
    pub card: u32,
    /// Device index on the card.
    pub device: u32,
    /// Short driver identifier (e.g. `"HDMI 0"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Stream direction of this node.
    pub direction: Direction,
}

impl PcmInfo {
    /// ALSA node name, e.g. `pcmC0D0p`.
    pub fn node_name(&self) -> String {
        format!(
            "pcmC{}D{}{}",
            self.card,
            self.device,
            self.direction.node_suffix()
        )
    }

    /// True when the identifier names a digital (HDMI) output.
    pub fn is_hdmi(&self) -> bool {
        self.id.to_ascii_lowercase().contains("hdmi")
    }

    /// Parse a node name of the form `pcmC<card>D<device><p|c>`.
    ///
    /// The returned info carries the node name as both id and name.
    pub fn from_node_name(node: &str) -> Option<PcmInfo> {
        let rest = node.trim().strip_prefix("pcmC")?;
        let (card, rest) = rest.split_once('D')?;
        let suffix = rest.chars().last()?;
        let direction = match suffix {
            'p' => Direction::Output,
            'c' => Direction::Input,
            _ => return None,
        };
        let device = &rest[..rest.len() - 1];
        Some(PcmInfo {
            card: card.parse().ok()?,
            device: device.parse().ok()?,
            id: node.trim().to_string(),
            name: node.trim().to_string(),
            direction,
        })
    }
}

/// Faults reported by a device session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcmError {
    /// Playback ran dry (or capture overflowed) and the stream was restarted.
    #[error("xrun")]
    Underrun,

    /// Device refused the requested parameters.
    #[error("device not ready: {0}")]
    NotReady(String),

    /// Session has been closed or the device disappeared.
    #[error("device closed")]
    Closed,

    /// Generic transfer fault.
    #[error("device I/O error: {0}")]
    Io(String),

    /// Timestamp or position query is not available.
    #[error("position unavailable")]
    NoPosition,

    /// A processing stage made no progress.
    #[error("processing stalled")]
    Stalled,
}

/// A live, open PCM session.
///
/// Reads and writes transfer whole buffers at the negotiated encoding and
/// block until the transfer is complete.
pub trait Pcm: Send {
    /// Parameters actually in effect.
    fn config(&self) -> &PcmConfig;

    /// Read exactly `data.len()` bytes of captured audio.
    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError>;

    /// Write all of `data` to the playback ring.
    fn write(&mut self, data: &[u8]) -> Result<(), PcmError>;

    /// Frames currently free in the playback ring, with the time the
    /// position was sampled.
    fn avail(&mut self) -> Result<(usize, Instant), PcmError>;

    /// Total frames in the hardware ring.
    fn buffer_frames(&self) -> usize {
        self.config().buffer_frames()
    }
}

/// Opens PCM sessions on concrete cards.
pub trait PcmDriver: Send + Sync {
    /// Open `info` for `direction` with the given parameters.
    ///
    /// The returned session's [`Pcm::config`] reports what was negotiated.
    fn open(
        &self,
        info: &PcmInfo,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError>;
}

/// Maps logical devices and routes to concrete cards.
pub trait DeviceLookup: Send + Sync {
    /// Select the card for `device` in `direction` under the route mask.
    fn select(&self, device: PcmDevice, direction: Direction, route: u32) -> Option<PcmInfo>;

    /// Last-ditch adjustments right before opening: may run bring-up actions
    /// and override the requested encoding.
    fn prepare(&self, _direction: Direction, _route: u32, _config: &mut PcmConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_roundtrip() {
        let info = PcmInfo::from_node_name("pcmC1D3p").unwrap();
        assert_eq!(info.card, 1);
        assert_eq!(info.device, 3);
        assert_eq!(info.direction, Direction::Output);
        assert_eq!(info.node_name(), "pcmC1D3p");
    }

    #[test]
    fn node_name_rejects_garbage() {
        assert!(PcmInfo::from_node_name("controlC0").is_none());
        assert!(PcmInfo::from_node_name("pcmC0D0x").is_none());
        assert!(PcmInfo::from_node_name("pcmCxD0p").is_none());
    }

    #[test]
    fn config_sizes() {
        assert_eq!(PcmConfig::OUTPUT.frame_bytes(), 4);
        assert_eq!(PcmConfig::OUTPUT.buffer_frames(), 4096);
        assert_eq!(PcmConfig::INPUT.period_bytes(), 4096);
        assert_eq!(PcmConfig::SCO.frame_bytes(), 2);
    }
}
