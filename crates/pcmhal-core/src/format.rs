//! Physical sample encodings and conversion to and from 16-bit PCM.
//!
//! Streams always speak signed 16-bit little-endian to their callers. The
//! physical device may be negotiated at a wider or narrower encoding:
//!
//! | format  | bytes | to 16-bit            | from 16-bit            |
//! |---------|-------|----------------------|------------------------|
//! | `S16Le` | 2     | identity             | identity               |
//! | `S32Le` | 4     | `s >> 16`            | `(s as i32) << 16`     |
//! | `U8`    | 1     | `(b - 0x80) << 8`    | `(s >> 8) + 0x80`      |
//!
//! The 8-bit encoding is offset binary (unsigned, 0x80 = silence).

use core::fmt;
use core::str::FromStr;

/// Physical PCM sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian.
    #[default]
    S16Le,
    /// Signed 32-bit little-endian.
    S32Le,
    /// Unsigned 8-bit, offset binary.
    U8,
}

impl SampleFormat {
    /// Bytes occupied by one sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S32Le => 4,
            SampleFormat::U8 => 1,
        }
    }

    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            SampleFormat::S16Le => "s16le",
            SampleFormat::S32Le => "s32le",
            SampleFormat::U8 => "u8",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a format name is not one of the supported encodings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported sample format '{0}'")]
pub struct UnknownFormat(pub String);

impl FromStr for SampleFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s16" | "s16le" | "s16_le" => Ok(SampleFormat::S16Le),
            "s32" | "s32le" | "s32_le" => Ok(SampleFormat::S32Le),
            "u8" | "s8" | "8" => Ok(SampleFormat::U8),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Decode raw device bytes into 16-bit samples.
///
/// Converts `min(raw.len() / bytes_per_sample, out.len())` samples and
/// returns that count.
pub fn decode_to_i16(raw: &[u8], format: SampleFormat, out: &mut [i16]) -> usize {
    let width = format.bytes_per_sample();
    let count = (raw.len() / width).min(out.len());
    let samples = raw.chunks_exact(width).take(count);
    match format {
        SampleFormat::S16Le => {
            for (dst, src) in out.iter_mut().zip(samples) {
                *dst = i16::from_le_bytes([src[0], src[1]]);
            }
        }
        SampleFormat::S32Le => {
            for (dst, src) in out.iter_mut().zip(samples) {
                *dst = (i32::from_le_bytes([src[0], src[1], src[2], src[3]]) >> 16) as i16;
            }
        }
        SampleFormat::U8 => {
            for (dst, src) in out.iter_mut().zip(samples) {
                *dst = (i16::from(src[0]) - 0x80) << 8;
            }
        }
    }
    count
}

/// Encode 16-bit samples into device bytes, replacing the contents of `out`.
pub fn encode_from_i16(samples: &[i16], format: SampleFormat, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::S16Le => {
            for &s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        SampleFormat::S32Le => {
            for &s in samples {
                out.extend_from_slice(&(i32::from(s) << 16).to_le_bytes());
            }
        }
        SampleFormat::U8 => {
            out.extend(samples.iter().map(|&s| ((s >> 8) + 0x80) as u8));
        }
    }
}

/// Keep the first channel of each interleaved stereo frame, in place.
///
/// After the call the first `frames` samples of `buffer` hold the mono
/// signal. This is decimation, not a mixdown.
pub fn keep_first_channel_in_place(buffer: &mut [i16], frames: usize) {
    let frames = frames.min(buffer.len().div_ceil(2));
    for i in 1..frames {
        buffer[i] = buffer[i * 2];
    }
}

/// Copy the first channel of each interleaved stereo frame into `out`.
///
/// Returns the number of mono frames written.
pub fn keep_first_channel(stereo: &[i16], out: &mut Vec<i16>) -> usize {
    out.clear();
    out.extend(stereo.chunks_exact(2).map(|frame| frame[0]));
    out.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s32_roundtrip_keeps_top_bits() {
        let samples = [i16::MIN, -1, 0, 1, 1234, i16::MAX];
        let mut raw = Vec::new();
        encode_from_i16(&samples, SampleFormat::S32Le, &mut raw);
        assert_eq!(raw.len(), samples.len() * 4);
        let mut back = [0i16; 6];
        assert_eq!(decode_to_i16(&raw, SampleFormat::S32Le, &mut back), 6);
        assert_eq!(back, samples);
    }

    #[test]
    fn u8_is_offset_binary() {
        let mut raw = Vec::new();
        encode_from_i16(&[0, i16::MIN, i16::MAX, -256], SampleFormat::U8, &mut raw);
        assert_eq!(raw, vec![0x80, 0x00, 0xff, 0x7f]);

        let mut back = [0i16; 4];
        decode_to_i16(&raw, SampleFormat::U8, &mut back);
        assert_eq!(back, [0, i16::MIN, 0x7f00, -256]);
    }

    #[test]
    fn decode_is_bounded_by_output() {
        let raw = [1u8, 0, 2, 0, 3, 0];
        let mut out = [0i16; 2];
        assert_eq!(decode_to_i16(&raw, SampleFormat::S16Le, &mut out), 2);
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("s32le".parse::<SampleFormat>(), Ok(SampleFormat::S32Le));
        assert_eq!("S8".parse::<SampleFormat>(), Ok(SampleFormat::U8));
        assert_eq!(" s16 ".parse::<SampleFormat>(), Ok(SampleFormat::S16Le));
        assert!("f32".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn first_channel_in_place() {
        let mut buf = [10, -10, 20, -20, 30, -30];
        keep_first_channel_in_place(&mut buf, 3);
        assert_eq!(&buf[..3], &[10, 20, 30]);
    }

    #[test]
    fn first_channel_copy() {
        let mut out = Vec::new();
        assert_eq!(keep_first_channel(&[1, 2, 3, 4, 5], &mut out), 2);
        assert_eq!(out, vec![1, 3]);
    }
}
