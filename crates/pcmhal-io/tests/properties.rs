//! Property-based tests for pacing bounds, preprocessing accounting and
//! the capture byte contract.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use pcmhal_core::{
    AudioConfig, ChannelLayout, ChunkResult, Clock, PcmError, PreProcessor,
};
use pcmhal_io::{AudioHw, Disposition, PreprocessPipeline, SimDriver, StaticCards, WritePacer};

struct NoSleep;

impl Clock for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Copies input to output unchanged.
struct Passthrough;

impl PreProcessor for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn process(&mut self, input: &[i16], output: &mut [i16]) -> ChunkResult {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        ChunkResult {
            consumed: n,
            produced: n,
        }
    }
}

fn disposition() -> impl Strategy<Value = Disposition> {
    prop_oneof![Just(Disposition::Short), Just(Disposition::Long)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The write threshold never leaves [0, threshold_max] and never moves
    /// by more than a quarter period except when snapping up from a
    /// depleted ring.
    #[test]
    fn threshold_stays_bounded(
        steps in prop::collection::vec((disposition(), 0usize..4096), 1..200),
    ) {
        let period = 512;
        let max = WritePacer::threshold_max(period);
        let mut pacer = WritePacer::new(period);
        for (wanted, kernel) in steps {
            pacer.set_disposition(wanted);
            let before = pacer.snapshot();
            pacer.converge(kernel);
            let after = pacer.snapshot();
            prop_assert!(after.current <= max, "{} > {}", after.current, max);
            if before.current != before.target {
                prop_assert!(after.current.abs_diff(before.current) <= period / 4);
                prop_assert!(after.current.abs_diff(after.target) < before.current.abs_diff(before.target));
            }
        }
    }

    /// With a pass-through chain every device frame reaches the caller
    /// exactly once and in order, whatever the request sizes.
    #[test]
    fn preprocessing_conserves_frames(
        requests in prop::collection::vec(1usize..700, 1..30),
        effects in 0usize..=3,
    ) {
        let mut pipeline = PreprocessPipeline::new();
        for _ in 0..effects {
            pipeline.add(Box::new(Passthrough)).unwrap();
        }
        let mut next = 0i16;
        let mut read = |buf: &mut [i16]| -> Result<usize, PcmError> {
            for s in buf.iter_mut() {
                *s = next;
                next = next.wrapping_add(1);
            }
            Ok(buf.len())
        };

        let mut expected = 0i16;
        for len in requests {
            let mut out = vec![0i16; len];
            let n = pipeline.process(16000, &mut out, &mut read).unwrap();
            prop_assert_eq!(n, len);
            for s in out {
                prop_assert_eq!(s, expected);
                expected = expected.wrapping_add(1);
            }
        }
    }

    /// A capture read always reports the full buffer, whatever the device
    /// does.
    #[test]
    fn read_always_reports_full_buffer(
        faults in prop::collection::vec(any::<bool>(), 1..20),
        len in 1usize..2048,
        rate_idx in 0usize..4,
    ) {
        let rate = [8000, 16000, 44100, 48000][rate_idx];
        let sim = SimDriver::new();
        let hw = AudioHw::builder()
            .driver(Arc::new(sim.clone()))
            .enumerator(Arc::new(StaticCards::single(0)))
            .clock(Arc::new(NoSleep))
            .build();
        let input = hw
            .open_input_stream(&mut AudioConfig::new(rate, ChannelLayout::Mono))
            .unwrap();

        for fault in faults {
            if fault {
                sim.script_read(Err(PcmError::Io("injected".into())));
            } else {
                sim.script_read(Ok(()));
            }
            let mut buf = vec![0i16; len];
            prop_assert_eq!(input.read(&mut buf), len * 2);
        }
    }
}
