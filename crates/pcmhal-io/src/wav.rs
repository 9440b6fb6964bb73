//! WAV file reading and writing for 16-bit streams.

use crate::Result;
use hound::{SampleFormat, WavReader, WavWriter};
use std::path::Path;

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// True for IEEE float samples.
    pub float: bool,
    /// Total number of sample frames (samples per channel).
    pub num_frames: u64,
}

impl WavInfo {
    fn from_spec(spec: hound::WavSpec, total_samples: u64) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            float: spec.sample_format == SampleFormat::Float,
            num_frames: total_samples / u64::from(spec.channels.max(1)),
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames as f64 / f64::from(self.sample_rate)
    }
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    Ok(WavInfo::from_spec(reader.spec(), u64::from(reader.len())))
}

/// Read a WAV file as interleaved 16-bit samples.
///
/// Integer files of any depth are rescaled to 16 bits; float files are
/// clamped to `[-1, 1]` and scaled. Channels are left interleaved.
pub fn read_wav_i16<P: AsRef<Path>>(path: P) -> Result<(Vec<i16>, WavInfo)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let info = WavInfo::from_spec(spec, u64::from(reader.len()));

    let samples: Vec<i16> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if bits > 16 {
                            (v >> (bits - 16)) as i16
                        } else {
                            (v << (16 - bits)) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    tracing::debug!(
        channels = info.channels,
        sample_rate = info.sample_rate,
        frames = info.num_frames,
        "wav loaded"
    );
    Ok((samples, info))
}

/// Write interleaved 16-bit samples to a WAV file.
pub fn write_wav_i16<P: AsRef<Path>>(
    path: P,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_keeps_interleaving() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let samples: Vec<i16> = (0..200).map(|i| if i % 2 == 0 { i } else { -i }).collect();
        write_wav_i16(&path, &samples, 2, 44100).unwrap();

        let (read, info) = read_wav_i16(&path).unwrap();
        assert_eq!(read, samples);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.num_frames, 100);
        assert!(!info.float);
    }

    #[test]
    fn float_files_are_scaled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for v in [0.0f32, 0.5, -1.0, 2.0] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let (read, info) = read_wav_i16(&path).unwrap();
        assert_eq!(read, vec![0, 16383, -32767, 32767]);
        assert!(info.float);
        assert!((info.duration_secs() - 4.0 / 16000.0).abs() < 1e-9);
    }

    #[test]
    fn info_without_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.wav");
        write_wav_i16(&path, &[0; 960], 1, 48000).unwrap();
        let info = read_wav_info(&path).unwrap();
        assert_eq!(info.num_frames, 960);
        assert!((info.duration_secs() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_wav_info("/nonexistent/file.wav").is_err());
    }
}
