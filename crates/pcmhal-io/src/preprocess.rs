//! 10 ms chunk preprocessing for capture streams.
//!
//! Effects work on chunks of exactly `rate / 100` frames, which rarely
//! matches the caller's read size. The pipeline accumulates device frames
//! until a chunk is available, runs the chain over it, and carries any
//! output the caller did not ask for into the next read.
//!
//! The effect list outlives standby; the accumulation and carry buffers do
//! not.

use pcmhal_core::{EffectId, PcmError, PreProcessor};

use crate::{Error, Result};

/// Most effects one capture stream can carry.
pub const MAX_PREPROCESSORS: usize = 3;

/// Ordered chain of preprocessing effects with its scratch buffers.
#[derive(Default)]
pub struct PreprocessPipeline {
    effects: Vec<(EffectId, Box<dyn PreProcessor>)>,
    next_id: u32,
    proc_in: Vec<i16>,
    frames_in: usize,
    stage_a: Vec<i16>,
    stage_b: Vec<i16>,
    carry: Vec<i16>,
}

impl PreprocessPipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect to the end of the chain.
    pub fn add(&mut self, effect: Box<dyn PreProcessor>) -> Result<EffectId> {
        if self.effects.len() >= MAX_PREPROCESSORS {
            return Err(Error::EffectCapacity);
        }
        let id = EffectId(self.next_id);
        self.next_id += 1;
        tracing::debug!(effect = effect.name(), id = id.0, "preprocessor attached");
        self.effects.push((id, effect));
        Ok(id)
    }

    /// Detach an effect.
    pub fn remove(&mut self, id: EffectId) -> Result<Box<dyn PreProcessor>> {
        if self.effects.is_empty() {
            return Err(Error::NoEffects);
        }
        let index = self
            .effects
            .iter()
            .position(|(eid, _)| *eid == id)
            .ok_or(Error::EffectNotFound(id))?;
        let (_, effect) = self.effects.remove(index);
        tracing::debug!(effect = effect.name(), id = id.0, "preprocessor detached");
        Ok(effect)
    }

    /// Attached effect count.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True when no effect is attached.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Frames produced but not yet delivered.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }

    /// Free the scratch buffers and reset every effect.
    pub fn release_scratch(&mut self) {
        self.proc_in = Vec::new();
        self.frames_in = 0;
        self.stage_a = Vec::new();
        self.stage_b = Vec::new();
        self.carry = Vec::new();
        for (_, effect) in &mut self.effects {
            effect.reset();
        }
    }

    /// Fill `out` with processed mono frames at `rate`.
    ///
    /// `read` fills its argument with raw frames from the device and returns
    /// how many it wrote; an error aborts the call and is returned as is.
    /// Device frames accumulated but not yet processed survive the error.
    pub fn process(
        &mut self,
        rate: u32,
        out: &mut [i16],
        mut read: impl FnMut(&mut [i16]) -> std::result::Result<usize, PcmError>,
    ) -> std::result::Result<usize, PcmError> {
        let chunk = (rate / 100).max(1) as usize;
        let frames_rq = out.len().div_ceil(chunk) * chunk;

        let mut written = self.carry.len().min(out.len());
        out[..written].copy_from_slice(&self.carry[..written]);
        self.carry.drain(..written);

        while written < out.len() {
            if self.proc_in.len() < frames_rq {
                self.proc_in.resize(frames_rq, 0);
            }
            let got = if self.frames_in < frames_rq {
                let n = read(&mut self.proc_in[self.frames_in..frames_rq])?;
                self.frames_in += n;
                n
            } else {
                0
            };

            let (consumed, produced) = self.run_chain(chunk);

            self.proc_in.copy_within(consumed..self.frames_in, 0);
            self.frames_in -= consumed;

            if produced == 0 {
                if consumed == 0 && got == 0 {
                    tracing::warn!("preprocessing chain made no progress");
                    return Err(PcmError::Stalled);
                }
                continue;
            }

            // Odd effect counts end in stage_a, even counts in stage_b.
            let output = if self.effects.is_empty() || self.effects.len() % 2 == 1 {
                &self.stage_a[..produced]
            } else {
                &self.stage_b[..produced]
            };
            let take = produced.min(out.len() - written);
            out[written..written + take].copy_from_slice(&output[..take]);
            self.carry.extend_from_slice(&output[take..]);
            written += take;
        }
        Ok(written)
    }

    /// Run every effect over one chunk of `proc_in`.
    ///
    /// Returns frames consumed by the first stage and produced by the last.
    fn run_chain(&mut self, chunk: usize) -> (usize, usize) {
        let avail = chunk.min(self.frames_in);
        if self.stage_a.len() < chunk {
            self.stage_a.resize(chunk, 0);
            self.stage_b.resize(chunk, 0);
        }

        if self.effects.is_empty() {
            self.stage_a[..avail].copy_from_slice(&self.proc_in[..avail]);
            return (avail, avail);
        }

        let mut consumed = 0;
        let mut produced = 0;
        for (index, (_, effect)) in self.effects.iter_mut().enumerate() {
            let result = if index == 0 {
                effect.process(&self.proc_in[..avail], &mut self.stage_a[..chunk])
            } else if index % 2 == 1 {
                effect.process(&self.stage_a[..produced], &mut self.stage_b[..chunk])
            } else {
                effect.process(&self.stage_b[..produced], &mut self.stage_a[..chunk])
            };
            if index == 0 {
                consumed = result.consumed.min(avail);
            }
            produced = result.produced.min(chunk);
        }
        (consumed, produced)
    }
}

impl std::fmt::Debug for PreprocessPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessPipeline")
            .field(
                "effects",
                &self.effects.iter().map(|(_, e)| e.name()).collect::<Vec<_>>(),
            )
            .field("frames_in", &self.frames_in)
            .field("carried", &self.carry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcmhal_core::{ChunkResult, DcRemover};

    /// Adds a constant to every sample.
    struct Offset(i16);

    impl PreProcessor for Offset {
        fn name(&self) -> &str {
            "offset"
        }

        fn process(&mut self, input: &[i16], output: &mut [i16]) -> ChunkResult {
            let n = input.len().min(output.len());
            for (o, i) in output.iter_mut().zip(input).take(n) {
                *o = i.saturating_add(self.0);
            }
            ChunkResult {
                consumed: n,
                produced: n,
            }
        }
    }

    /// Consumes input but never produces.
    struct Sink;

    impl PreProcessor for Sink {
        fn name(&self) -> &str {
            "sink"
        }

        fn process(&mut self, input: &[i16], _output: &mut [i16]) -> ChunkResult {
            ChunkResult {
                consumed: input.len(),
                produced: 0,
            }
        }
    }

    /// Consumes nothing and produces nothing.
    struct Stuck;

    impl PreProcessor for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn process(&mut self, _input: &[i16], _output: &mut [i16]) -> ChunkResult {
            ChunkResult::default()
        }
    }

    fn counter() -> impl FnMut(&mut [i16]) -> std::result::Result<usize, PcmError> {
        let mut next = 0i16;
        move |buf: &mut [i16]| {
            for s in buf.iter_mut() {
                *s = next;
                next = next.wrapping_add(1);
            }
            Ok(buf.len())
        }
    }

    #[test]
    fn capacity_and_removal_errors() {
        let mut pipeline = PreprocessPipeline::new();
        assert!(matches!(
            pipeline.remove(EffectId(0)),
            Err(Error::NoEffects)
        ));
        let ids: Vec<_> = (0..3)
            .map(|_| pipeline.add(Box::new(DcRemover::new())).unwrap())
            .collect();
        assert!(matches!(
            pipeline.add(Box::new(DcRemover::new())),
            Err(Error::EffectCapacity)
        ));
        assert!(matches!(
            pipeline.remove(EffectId(99)),
            Err(Error::EffectNotFound(EffectId(99)))
        ));
        pipeline.remove(ids[1]).unwrap();
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn effects_run_in_order() {
        let mut pipeline = PreprocessPipeline::new();
        pipeline.add(Box::new(Offset(1))).unwrap();
        pipeline.add(Box::new(Offset(10))).unwrap();
        pipeline.add(Box::new(Offset(100))).unwrap();
        let mut out = vec![0i16; 160];
        let n = pipeline.process(16000, &mut out, counter()).unwrap();
        assert_eq!(n, 160);
        let expected: Vec<i16> = (0..160).map(|i| i + 111).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn excess_output_is_carried() {
        let mut pipeline = PreprocessPipeline::new();
        pipeline.add(Box::new(Offset(0))).unwrap();
        let mut read = counter();

        // 100 frames at 16 kHz needs one 160-frame chunk; 60 are carried.
        let mut out = vec![0i16; 100];
        pipeline.process(16000, &mut out, &mut read).unwrap();
        assert_eq!(out[99], 99);
        assert_eq!(pipeline.carried(), 60);

        // The carry is delivered first and in order.
        let mut out = vec![0i16; 50];
        pipeline.process(16000, &mut out, &mut read).unwrap();
        assert_eq!(out[0], 100);
        assert_eq!(out[49], 149);
        assert_eq!(pipeline.carried(), 10);
    }

    #[test]
    fn zero_output_reads_more() {
        let mut pipeline = PreprocessPipeline::new();
        pipeline.add(Box::new(Sink)).unwrap();
        let mut reads = 0;
        let mut out = vec![0i16; 80];
        let err = pipeline
            .process(8000, &mut out, |buf: &mut [i16]| {
                reads += 1;
                if reads > 3 {
                    return Err(PcmError::Io("done".into()));
                }
                Ok(buf.len())
            })
            .unwrap_err();
        assert_eq!(err, PcmError::Io("done".into()));
        assert_eq!(reads, 4);
    }

    #[test]
    fn stuck_chain_reports_stall() {
        let mut pipeline = PreprocessPipeline::new();
        pipeline.add(Box::new(Stuck)).unwrap();
        let mut out = vec![0i16; 80];
        assert_eq!(
            pipeline.process(8000, &mut out, counter()),
            Err(PcmError::Stalled)
        );
    }

    #[test]
    fn release_scratch_drops_carry() {
        let mut pipeline = PreprocessPipeline::new();
        pipeline.add(Box::new(Offset(0))).unwrap();
        let mut out = vec![0i16; 10];
        pipeline.process(16000, &mut out, counter()).unwrap();
        assert!(pipeline.carried() > 0);
        pipeline.release_scratch();
        assert_eq!(pipeline.carried(), 0);
        assert_eq!(pipeline.len(), 1);
    }
}
