//! Caller-facing stream configuration.

/// Channel layout of a caller stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// One channel.
    Mono,
    /// Two interleaved channels.
    Stereo,
}

impl ChannelLayout {
    /// Channel count.
    pub const fn count(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Caller-facing sample format. Streams only speak 16-bit PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// Signed 16-bit native PCM.
    #[default]
    Pcm16,
}

impl AudioFormat {
    /// Bytes per sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            AudioFormat::Pcm16 => 2,
        }
    }
}

/// Stream configuration negotiated at open time and fixed for the stream's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout.
    pub channels: ChannelLayout,
    /// Sample format.
    pub format: AudioFormat,
}

impl AudioConfig {
    /// Build a 16-bit configuration.
    pub const fn new(sample_rate: u32, channels: ChannelLayout) -> Self {
        Self {
            sample_rate,
            channels,
            format: AudioFormat::Pcm16,
        }
    }

    /// Bytes per interleaved frame.
    pub const fn frame_bytes(&self) -> usize {
        self.channels.count() * self.format.bytes_per_sample()
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new(48000, ChannelLayout::Stereo)
    }
}
