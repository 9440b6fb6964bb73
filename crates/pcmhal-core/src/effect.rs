//! Capture preprocessing effects.
//!
//! A [`PreProcessor`] works on fixed 10 ms chunks of mono 16-bit audio and
//! reports how many frames it consumed from its input and produced into its
//! output. Stages are chained by threading those counts through: each stage
//! sees the frames the previous one produced.

/// Frame counts reported by one [`PreProcessor::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkResult {
    /// Input frames consumed.
    pub consumed: usize,
    /// Output frames produced.
    pub produced: usize,
}

/// Handle identifying an attached preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u32);

/// A 10 ms chunk capture effect (noise suppression, echo cancellation, ...).
///
/// Implementations must not produce more than `output.len()` frames nor
/// consume more than `input.len()` frames.
pub trait PreProcessor: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Process up to one chunk.
    fn process(&mut self, input: &[i16], output: &mut [i16]) -> ChunkResult;

    /// Clear internal state (called when the stream goes to standby).
    fn reset(&mut self) {}
}

/// Removes DC offset from captured audio.
///
/// First-order highpass `y[n] = x[n] - x[n-1] + R * y[n-1]`, with `R` stored
/// in Q15 so the whole filter stays in integer arithmetic. The default
/// `R = 0.995` puts the cutoff near 7 Hz at 48 kHz.
#[derive(Debug, Clone)]
pub struct DcRemover {
    coeff_q15: i32,
    x_prev: i32,
    y_prev: i32,
}

impl DcRemover {
    /// Default pole position in Q15 (0.995).
    const DEFAULT_COEFF_Q15: i32 = 32604;

    /// Create a remover with the default cutoff.
    pub fn new() -> Self {
        Self::with_coeff_q15(Self::DEFAULT_COEFF_Q15)
    }

    /// Create a remover with an explicit Q15 pole, clamped to `[0.9, 0.9999]`.
    pub fn with_coeff_q15(coeff_q15: i32) -> Self {
        Self {
            coeff_q15: coeff_q15.clamp(29491, 32764),
            x_prev: 0,
            y_prev: 0,
        }
    }

    #[inline]
    fn tick(&mut self, x: i16) -> i16 {
        let x = i32::from(x);
        let y = x - self.x_prev + ((self.coeff_q15 * self.y_prev) >> 15);
        self.x_prev = x;
        self.y_prev = y.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        self.y_prev as i16
    }
}

impl Default for DcRemover {
    fn default() -> Self {
        Self::new()
    }
}

impl PreProcessor for DcRemover {
    fn name(&self) -> &str {
        "dc-remover"
    }

    fn process(&mut self, input: &[i16], output: &mut [i16]) -> ChunkResult {
        let n = input.len().min(output.len());
        for (dst, &src) in output[..n].iter_mut().zip(&input[..n]) {
            *dst = self.tick(src);
        }
        ChunkResult {
            consumed: n,
            produced: n,
        }
    }

    fn reset(&mut self) {
        self.x_prev = 0;
        self.y_prev = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_constant_offset() {
        let mut dc = DcRemover::new();
        let input = vec![4000i16; 4800];
        let mut output = vec![0i16; 4800];
        let res = dc.process(&input, &mut output);
        assert_eq!(res, ChunkResult { consumed: 4800, produced: 4800 });
        assert!(output[4799].abs() < 50, "residual {}", output[4799]);
    }

    #[test]
    fn bounded_by_shorter_buffer() {
        let mut dc = DcRemover::new();
        let mut output = [0i16; 3];
        let res = dc.process(&[1, 2, 3, 4, 5], &mut output);
        assert_eq!(res.consumed, 3);
        assert_eq!(res.produced, 3);
    }

    #[test]
    fn reset_clears_history() {
        let mut dc = DcRemover::new();
        let mut out = [0i16; 1];
        dc.process(&[1000], &mut out);
        dc.reset();
        dc.process(&[1000], &mut out);
        assert_eq!(out[0], 1000);
    }
}
