//! Capture-side [`BufferProvider`] over a device session.
//!
//! The bridge reads one device period at a time, decodes it to 16-bit and
//! reduces stereo to its first channel, then hands out the unconsumed tail
//! of that period until it is exhausted. A failed read is remembered in the
//! [`CaptureBuffer`] so the engine can tell a short pull apart from a fault.

use pcmhal_core::{
    BufferProvider, Pcm, PcmConfig, PcmError, SampleFormat, decode_to_i16,
    keep_first_channel_in_place,
};

/// One period of captured audio plus the read status.
#[derive(Debug)]
pub struct CaptureBuffer {
    raw: Vec<u8>,
    frames: Vec<i16>,
    frames_in: usize,
    period: usize,
    channels: usize,
    format: SampleFormat,
    status: Option<PcmError>,
}

impl CaptureBuffer {
    /// Allocate buffers for one period of `config`.
    pub fn new(config: &PcmConfig) -> Self {
        let channels = usize::from(config.channels.max(1));
        Self {
            raw: vec![0; config.period_bytes()],
            frames: vec![0; config.period_size * channels],
            frames_in: 0,
            period: config.period_size,
            channels,
            format: config.format,
            status: None,
        }
    }

    /// Frames of the current period not yet handed out.
    pub fn frames_in(&self) -> usize {
        self.frames_in
    }

    /// Take the status of the last device read, leaving it clear.
    pub fn take_status(&mut self) -> Option<PcmError> {
        self.status.take()
    }

    fn refill(&mut self, pcm: &mut dyn Pcm) -> Result<(), PcmError> {
        if let Err(err) = pcm.read(&mut self.raw) {
            tracing::warn!(%err, "capture read failed");
            self.status = Some(err.clone());
            return Err(err);
        }
        self.status = None;
        decode_to_i16(&self.raw, self.format, &mut self.frames);
        if self.channels == 2 {
            keep_first_channel_in_place(&mut self.frames, self.period);
        }
        self.frames_in = self.period;
        Ok(())
    }
}

/// Borrowing adapter that lets a resampler pull from a device session.
pub struct PcmBridge<'a> {
    pcm: &'a mut dyn Pcm,
    capture: &'a mut CaptureBuffer,
}

impl<'a> PcmBridge<'a> {
    /// Bridge `pcm` through `capture`.
    pub fn new(pcm: &'a mut dyn Pcm, capture: &'a mut CaptureBuffer) -> Self {
        Self { pcm, capture }
    }
}

impl BufferProvider for PcmBridge<'_> {
    fn next_buffer(&mut self, max_frames: usize) -> Result<&[i16], PcmError> {
        if self.capture.frames_in == 0 {
            self.capture.refill(self.pcm)?;
        }
        let start = self.capture.period - self.capture.frames_in;
        let len = max_frames.min(self.capture.frames_in);
        Ok(&self.capture.frames[start..start + len])
    }

    fn release_buffer(&mut self, frames: usize) {
        self.capture.frames_in = self.capture.frames_in.saturating_sub(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Produces stereo periods where left = frame index, right = -1.
    struct RampPcm {
        config: PcmConfig,
        next: i16,
        reads: usize,
        fail: bool,
    }

    impl Pcm for RampPcm {
        fn config(&self) -> &PcmConfig {
            &self.config
        }

        fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
            if self.fail {
                return Err(PcmError::Io("gone".into()));
            }
            self.reads += 1;
            for frame in data.chunks_exact_mut(4) {
                frame[..2].copy_from_slice(&self.next.to_le_bytes());
                frame[2..].copy_from_slice(&(-1i16).to_le_bytes());
                self.next = self.next.wrapping_add(1);
            }
            Ok(())
        }

        fn write(&mut self, _data: &[u8]) -> Result<(), PcmError> {
            Err(PcmError::Closed)
        }

        fn avail(&mut self) -> Result<(usize, Instant), PcmError> {
            Err(PcmError::NoPosition)
        }
    }

    fn ramp(fail: bool) -> RampPcm {
        let mut config = PcmConfig::INPUT;
        config.period_size = 8;
        RampPcm {
            config,
            next: 0,
            reads: 0,
            fail,
        }
    }

    #[test]
    fn hands_out_tail_of_period() {
        let mut pcm = ramp(false);
        let mut capture = CaptureBuffer::new(&pcm.config);
        let mut bridge = PcmBridge::new(&mut pcm, &mut capture);

        assert_eq!(bridge.next_buffer(3).unwrap(), &[0, 1, 2]);
        bridge.release_buffer(3);
        assert_eq!(bridge.next_buffer(100).unwrap(), &[3, 4, 5, 6, 7]);
        bridge.release_buffer(5);
        // Exhausted: the next call reads a fresh period.
        assert_eq!(bridge.next_buffer(2).unwrap(), &[8, 9]);
        drop(bridge);
        assert_eq!(pcm.reads, 2);
    }

    #[test]
    fn does_not_reread_before_exhausted() {
        let mut pcm = ramp(false);
        let mut capture = CaptureBuffer::new(&pcm.config);
        let mut bridge = PcmBridge::new(&mut pcm, &mut capture);
        for _ in 0..4 {
            let len = bridge.next_buffer(2).unwrap().len();
            bridge.release_buffer(len);
        }
        drop(bridge);
        assert_eq!(pcm.reads, 1);
        assert_eq!(capture.frames_in(), 0);
    }

    #[test]
    fn read_failure_sets_status() {
        let mut pcm = ramp(true);
        let mut capture = CaptureBuffer::new(&pcm.config);
        let mut bridge = PcmBridge::new(&mut pcm, &mut capture);
        assert!(bridge.next_buffer(4).is_err());
        drop(bridge);
        assert_eq!(capture.take_status(), Some(PcmError::Io("gone".into())));
        assert_eq!(capture.take_status(), None);
    }

    #[test]
    fn mono_period_is_passed_through() {
        let mut pcm = ramp(false);
        pcm.config.channels = 1;
        pcm.config.period_size = 4;
        let mut capture = CaptureBuffer::new(&pcm.config);
        let mut bridge = PcmBridge::new(&mut pcm, &mut capture);
        // Mono device: every 16-bit word is a frame (0, -1, 1, -1).
        assert_eq!(bridge.next_buffer(4).unwrap(), &[0, -1, 1, -1]);
    }
}
