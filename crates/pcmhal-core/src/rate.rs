//! Hardware rate families.
//!
//! Every open PCM on the card shares one clock domain, so all of them must
//! run rates from the same group:
//!
//! - 8 kHz multiples: 8000, 16000, 32000, 48000
//! - 11.025 kHz multiples: 11025, 22050, 44100
//!
//! The voice path needs the first group; 44.1 kHz playback needs the second.

/// Clock domain a sample rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateFamily {
    /// Multiples of 8000 Hz.
    Khz8,
    /// Multiples of 11025 Hz.
    Khz11,
    /// Neither (never produced by the built-in configs).
    Other,
}

impl RateFamily {
    /// Classify a rate.
    pub const fn of(rate: u32) -> Self {
        if rate % 8000 == 0 {
            RateFamily::Khz8
        } else if rate % 11025 == 0 {
            RateFamily::Khz11
        } else {
            RateFamily::Other
        }
    }
}

/// True when a session at `opening` cannot coexist with one at `active`.
///
/// The check is directional: the opening rate's family decides which
/// divisibility test applies to the active rate.
pub const fn rates_conflict(opening: u32, active: u32) -> bool {
    (opening % 8000 == 0 && active % 8000 != 0) || (opening % 11025 == 0 && active % 11025 != 0)
}
