//! Sample-rate conversion.
//!
//! A [`Resampler`] runs in one of two modes:
//!
//! - **push** ([`Resampler::resample_from_input`]): the caller hands over a
//!   block of input and a bounded output buffer; the resampler reports how
//!   much of each it used. Used on the playback path.
//! - **pull** ([`Resampler::resample_from_provider`]): the resampler asks a
//!   [`BufferProvider`] for input as it needs it until the output buffer is
//!   full. Used on the capture path, where the provider reads the device.
//!
//! [`LinearResampler`] is the built-in implementation: linear interpolation
//! with exact integer phase tracking, so the number of frames produced over
//! any sequence of calls is `ceil(frames_in * out_rate / in_rate)`.

use crate::pcm::PcmError;

/// Supplies input frames to a pull-mode resampler.
pub trait BufferProvider {
    /// Borrow up to `max_frames` interleaved frames of input.
    ///
    /// An error means no input is available now; the provider records the
    /// fault for its owner.
    fn next_buffer(&mut self, max_frames: usize) -> Result<&[i16], PcmError>;

    /// Mark `frames` of the last returned buffer as consumed.
    fn release_buffer(&mut self, frames: usize);
}

/// Sample-rate converter over interleaved 16-bit frames.
pub trait Resampler: Send {
    /// Convert from `input` into `output`.
    ///
    /// Returns `(frames consumed, frames produced)`. Input left unconsumed
    /// because `output` filled up is the caller's to keep or drop.
    fn resample_from_input(&mut self, input: &[i16], output: &mut [i16]) -> (usize, usize);

    /// Fill `output` by pulling input from `provider`.
    ///
    /// Returns the frames produced, which is short of `output` only when the
    /// provider failed.
    fn resample_from_provider(
        &mut self,
        provider: &mut dyn BufferProvider,
        output: &mut [i16],
    ) -> usize;
}

/// Requested conversion quality. For the linear resampler this selects the
/// anti-aliasing filter length when downsampling; `Low` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplerQuality {
    /// Cheapest available.
    Low,
    /// Platform default.
    #[default]
    Default,
    /// Best available.
    High,
}

/// Resampler construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResamplerError {
    /// A rate of zero was requested.
    #[error("invalid rate conversion {in_rate} -> {out_rate}")]
    InvalidRate {
        /// Input rate.
        in_rate: u32,
        /// Output rate.
        out_rate: u32,
    },

    /// Unsupported channel count.
    #[error("unsupported channel count {0}")]
    InvalidChannels(usize),
}

/// Constructs resamplers for the engines.
pub trait ResamplerFactory: Send + Sync {
    /// Create a resampler converting `in_rate` to `out_rate`.
    fn create(
        &self,
        in_rate: u32,
        out_rate: u32,
        channels: usize,
        quality: ResamplerQuality,
    ) -> Result<Box<dyn Resampler>, ResamplerError>;
}

/// Linear-interpolating resampler.
///
/// The phase is tracked as an integer numerator over `out_rate` (after
/// reducing both rates by their GCD), so there is no drift. Output frame `k`
/// interpolates between input frames `floor(k * in / out) - 1` and
/// `floor(k * in / out)`, which costs one frame of latency and never needs
/// lookahead.
///
/// When downsampling above [`ResamplerQuality::Low`], input first passes
/// through a causal windowed-sinc lowpass (Q15 taps, unity DC gain) with its
/// cutoff just below the output Nyquist. The filter only reads past input,
/// so frame counts are the same as without it.
pub struct LinearResampler {
    in_step: u64,
    out_step: u64,
    channels: usize,
    /// Position of the next output frame relative to the next unconsumed
    /// input frame, in units of `1 / out_step` input frames.
    phase: u64,
    /// Last consumed input frame, after filtering.
    prev: Vec<i16>,
    /// Anti-aliasing taps in Q15; empty when unfiltered.
    taps: Vec<i32>,
    /// Raw input frames preceding the next unconsumed one, `taps.len() - 1`
    /// frames long.
    history: Vec<i16>,
}

impl LinearResampler {
    /// Create an unfiltered resampler for the given conversion.
    pub fn new(in_rate: u32, out_rate: u32, channels: usize) -> Result<Self, ResamplerError> {
        Self::with_quality(in_rate, out_rate, channels, ResamplerQuality::Low)
    }

    /// Create a resampler, adding an anti-aliasing filter when downsampling
    /// at `Default` or `High` quality.
    pub fn with_quality(
        in_rate: u32,
        out_rate: u32,
        channels: usize,
        quality: ResamplerQuality,
    ) -> Result<Self, ResamplerError> {
        if in_rate == 0 || out_rate == 0 {
            return Err(ResamplerError::InvalidRate { in_rate, out_rate });
        }
        if channels == 0 || channels > 2 {
            return Err(ResamplerError::InvalidChannels(channels));
        }
        let taps = if out_rate < in_rate {
            antialias_taps(in_rate, out_rate, quality)
        } else {
            Vec::new()
        };
        let g = gcd(u64::from(in_rate), u64::from(out_rate));
        Ok(Self {
            in_step: u64::from(in_rate) / g,
            out_step: u64::from(out_rate) / g,
            channels,
            phase: 0,
            prev: vec![0; channels],
            history: vec![0; taps.len().saturating_sub(1) * channels],
            taps,
        })
    }

    /// Output frames produced for `in_frames` input frames from a fresh
    /// state with unlimited output room.
    pub fn frames_out_for(&self, in_frames: usize) -> usize {
        (in_frames as u64 * self.out_step).div_ceil(self.in_step) as usize
    }

    /// Number of anti-aliasing taps in use (0 when unfiltered).
    pub fn filter_len(&self) -> usize {
        self.taps.len()
    }

    /// Input sample `frame` of channel `c`, after the lowpass when present.
    fn filtered(&self, input: &[i16], frame: usize, c: usize) -> i64 {
        let ch = self.channels;
        if self.taps.is_empty() {
            return i64::from(input[frame * ch + c]);
        }
        let hist_frames = self.history.len() / ch;
        let acc: i64 = self
            .taps
            .iter()
            .enumerate()
            .map(|(t, &h)| {
                let x = if t <= frame {
                    input[(frame - t) * ch + c]
                } else {
                    self.history[(hist_frames + frame - t) * ch + c]
                };
                i64::from(h) * i64::from(x)
            })
            .sum();
        ((acc + (1 << 14)) >> 15).clamp(i64::from(i16::MIN), i64::from(i16::MAX))
    }

    /// Slide the raw history forward over `consumed` interleaved samples.
    fn remember(&mut self, consumed: &[i16]) {
        let keep = self.history.len();
        if keep == 0 {
            return;
        }
        if consumed.len() >= keep {
            self.history
                .copy_from_slice(&consumed[consumed.len() - keep..]);
        } else {
            self.history.copy_within(consumed.len().., 0);
            self.history[keep - consumed.len()..].copy_from_slice(consumed);
        }
    }

    fn run(&mut self, input: &[i16], output: &mut [i16]) -> (usize, usize) {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        let out_cap = output.len() / ch;
        let mut produced = 0;

        while produced < out_cap {
            let i = (self.phase / self.out_step) as usize;
            if i >= in_frames {
                break;
            }
            let frac = (self.phase % self.out_step) as i64;
            let den = self.out_step as i64;
            for c in 0..ch {
                let a = if i == 0 {
                    i64::from(self.prev[c])
                } else {
                    self.filtered(input, i - 1, c)
                };
                let b = self.filtered(input, i, c);
                output[produced * ch + c] = (a + (b - a) * frac / den) as i16;
            }
            produced += 1;
            self.phase += self.in_step;
        }

        let consumed = ((self.phase / self.out_step) as usize).min(in_frames);
        if consumed > 0 {
            for c in 0..ch {
                let last = self.filtered(input, consumed - 1, c);
                self.prev[c] = last as i16;
            }
            self.remember(&input[..consumed * ch]);
            self.phase -= consumed as u64 * self.out_step;
        }
        (consumed, produced)
    }
}

/// Lowpass taps for an `in_rate -> out_rate` reduction, or none at `Low`.
///
/// Length grows with the decimation ratio so the transition band stays
/// narrow relative to the output Nyquist.
fn antialias_taps(in_rate: u32, out_rate: u32, quality: ResamplerQuality) -> Vec<i32> {
    let per_ratio = match quality {
        ResamplerQuality::Low => return Vec::new(),
        ResamplerQuality::Default => 16,
        ResamplerQuality::High => 32,
    };
    let ratio = in_rate.div_ceil(out_rate) as usize;
    let num_taps = (per_ratio * ratio + 1).min(255);
    let cutoff = 0.9 * f64::from(out_rate) / f64::from(in_rate);
    design_lowpass_q15(num_taps, cutoff)
}

/// Blackman-windowed sinc lowpass in Q15, summing to exactly 1.0.
///
/// `cutoff` is normalized to the input Nyquist.
fn design_lowpass_q15(num_taps: usize, cutoff: f64) -> Vec<i32> {
    use std::f64::consts::PI;

    let m = (num_taps - 1) as f64;
    let coeffs: Vec<f64> = (0..num_taps)
        .map(|n| {
            let x = n as f64 - m / 2.0;
            let sinc = if x.abs() < 1e-9 {
                cutoff
            } else {
                (PI * cutoff * x).sin() / (PI * x)
            };
            let phase = 2.0 * PI * n as f64 / m;
            sinc * (0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos())
        })
        .collect();
    let sum: f64 = coeffs.iter().sum();

    let mut taps: Vec<i32> = coeffs
        .iter()
        .map(|c| (c / sum * 32768.0).round() as i32)
        .collect();
    let error = 32768 - taps.iter().sum::<i32>();
    taps[num_taps / 2] += error;
    taps
}

impl Resampler for LinearResampler {
    fn resample_from_input(&mut self, input: &[i16], output: &mut [i16]) -> (usize, usize) {
        self.run(input, output)
    }

    fn resample_from_provider(
        &mut self,
        provider: &mut dyn BufferProvider,
        output: &mut [i16],
    ) -> usize {
        let ch = self.channels;
        let wanted = output.len() / ch;
        let mut produced = 0;

        while produced < wanted {
            let remaining = (wanted - produced) as u64;
            let needed =
                ((self.phase + (remaining - 1) * self.in_step) / self.out_step) as usize + 1;
            let Ok(input) = provider.next_buffer(needed) else {
                break;
            };
            if input.is_empty() {
                break;
            }
            let (consumed, made) = self.run(input, &mut output[produced * ch..]);
            provider.release_buffer(consumed);
            produced += made;
            if consumed == 0 && made == 0 {
                break;
            }
        }
        produced
    }
}

/// Factory for [`LinearResampler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearResamplerFactory;

impl ResamplerFactory for LinearResamplerFactory {
    fn create(
        &self,
        in_rate: u32,
        out_rate: u32,
        channels: usize,
        quality: ResamplerQuality,
    ) -> Result<Box<dyn Resampler>, ResamplerError> {
        let resampler = LinearResampler::with_quality(in_rate, out_rate, channels, quality)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            in_rate,
            out_rate,
            channels,
            taps = resampler.filter_len(),
            "linear resampler created"
        );
        Ok(Box::new(resampler))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecProvider {
        data: Vec<i16>,
        pos: usize,
        chunk: usize,
        fail_after: Option<usize>,
    }

    impl BufferProvider for VecProvider {
        fn next_buffer(&mut self, max_frames: usize) -> Result<&[i16], PcmError> {
            if self.fail_after.is_some_and(|limit| self.pos >= limit) {
                return Err(PcmError::Io("scripted".into()));
            }
            let end = (self.pos + max_frames.min(self.chunk)).min(self.data.len());
            Ok(&self.data[self.pos..end])
        }

        fn release_buffer(&mut self, frames: usize) {
            self.pos += frames;
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(LinearResampler::new(0, 48000, 1).is_err());
        assert!(LinearResampler::new(48000, 44100, 3).is_err());
    }

    #[test]
    fn downsample_48k_to_44k1_frame_count() {
        let mut rs = LinearResampler::new(48000, 44100, 2).unwrap();
        let input = vec![100i16; 512 * 2];
        let mut output = vec![0i16; 471 * 2];
        let (consumed, produced) = rs.resample_from_input(&input, &mut output);
        assert_eq!(consumed, 512);
        assert_eq!(produced, 471);
        assert_eq!(rs.frames_out_for(512), 471);
    }

    #[test]
    fn cumulative_count_has_no_drift() {
        let mut rs = LinearResampler::new(48000, 44100, 1).unwrap();
        let input = vec![0i16; 480];
        let mut output = vec![0i16; 1000];
        let mut total = 0;
        for _ in 0..100 {
            let (consumed, produced) = rs.resample_from_input(&input, &mut output);
            assert_eq!(consumed, 480);
            total += produced;
        }
        assert_eq!(total, 44100);
    }

    #[test]
    fn capacity_limited_push_keeps_remainder() {
        let mut rs = LinearResampler::new(8000, 16000, 1).unwrap();
        let input: Vec<i16> = (0..10).collect();
        let mut output = vec![0i16; 6];
        let (consumed, produced) = rs.resample_from_input(&input, &mut output);
        assert_eq!(produced, 6);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn constant_signal_stays_constant_after_warmup() {
        let mut rs = LinearResampler::new(44100, 48000, 1).unwrap();
        let input = vec![1000i16; 441];
        let mut output = vec![0i16; 600];
        let (_, produced) = rs.resample_from_input(&input, &mut output);
        assert!(output[2..produced].iter().all(|&s| s == 1000));
    }

    fn rms(samples: &[i16]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn filter_only_when_downsampling() {
        let up = LinearResampler::with_quality(8000, 48000, 1, ResamplerQuality::High).unwrap();
        assert_eq!(up.filter_len(), 0);
        let low = LinearResampler::with_quality(48000, 8000, 1, ResamplerQuality::Low).unwrap();
        assert_eq!(low.filter_len(), 0);
        let down =
            LinearResampler::with_quality(48000, 8000, 1, ResamplerQuality::Default).unwrap();
        assert_eq!(down.filter_len(), 97);
        assert_eq!(design_lowpass_q15(97, 0.15).iter().sum::<i32>(), 32768);
    }

    #[test]
    fn tone_above_output_nyquist_is_suppressed() {
        // 10 kHz at 48 kHz folds to 2 kHz at 8 kHz without filtering.
        let tone: Vec<i16> = (0..4800)
            .map(|i| {
                let t = i as f64 / 48000.0;
                (10_000.0 * (2.0 * std::f64::consts::PI * 10_000.0 * t).sin()) as i16
            })
            .collect();
        let mut plain = LinearResampler::new(48000, 8000, 1).unwrap();
        let mut filtered =
            LinearResampler::with_quality(48000, 8000, 1, ResamplerQuality::Default).unwrap();
        let mut out_plain = vec![0i16; 800];
        let mut out_filtered = vec![0i16; 800];
        // Feed in small blocks so the filter history crosses call boundaries.
        let (mut made_plain, mut made_filtered) = (0, 0);
        for block in tone.chunks(100) {
            let (_, p) = plain.resample_from_input(block, &mut out_plain[made_plain..]);
            let (_, f) = filtered.resample_from_input(block, &mut out_filtered[made_filtered..]);
            made_plain += p;
            made_filtered += f;
        }
        assert_eq!(made_plain, made_filtered);
        assert!(rms(&out_plain[32..made_plain]) > 5000.0);
        assert!(rms(&out_filtered[32..made_filtered]) < 200.0);
    }

    #[test]
    fn filtered_constant_signal_stays_constant() {
        let mut rs =
            LinearResampler::with_quality(48000, 16000, 2, ResamplerQuality::High).unwrap();
        let input = vec![1000i16; 960 * 2];
        let mut output = vec![0i16; 320 * 2];
        let (_, produced) = rs.resample_from_input(&input, &mut output);
        assert_eq!(produced, 320);
        let settled = rs.filter_len() / 3 + 2;
        assert!(output[settled * 2..].iter().all(|&s| s == 1000));
    }

    #[test]
    fn pull_mode_fills_output() {
        let mut rs = LinearResampler::new(48000, 16000, 1).unwrap();
        let mut provider = VecProvider {
            data: (0..3000).map(|i| (i % 100) as i16).collect(),
            pos: 0,
            chunk: 256,
            fail_after: None,
        };
        let mut output = vec![0i16; 160];
        assert_eq!(rs.resample_from_provider(&mut provider, &mut output), 160);
        assert!(provider.pos >= 478 && provider.pos <= 480);
    }

    #[test]
    fn pull_mode_stops_on_provider_fault() {
        let mut rs = LinearResampler::new(48000, 48000 / 3, 1).unwrap();
        let mut provider = VecProvider {
            data: vec![0; 3000],
            pos: 0,
            chunk: 64,
            fail_after: Some(128),
        };
        let mut output = vec![0i16; 160];
        let produced = rs.resample_from_provider(&mut provider, &mut output);
        assert!(produced < 160);
    }
}
