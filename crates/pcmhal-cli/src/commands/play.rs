//! WAV playback through an output stream.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use pcmhal_core::{AudioConfig, LinearResampler, OUT_SAMPLING_RATE, Resampler};
use pcmhal_io::{Error, read_wav_i16};

use super::common::{Global, parse_output_route, running_flag};

#[derive(Args)]
pub struct PlayArgs {
    /// WAV file to play
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output route, e.g. "speaker", "headphone", "speaker|hdmi", "sco"
    #[arg(short, long, default_value = "speaker")]
    route: String,

    /// Treat the screen as off (deep buffering)
    #[arg(long)]
    screen_off: bool,
}

pub fn run(global: &Global, args: PlayArgs) -> anyhow::Result<()> {
    let (samples, info) =
        read_wav_i16(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    println!(
        "Loaded {}: {} frames, {} ch, {} Hz, {:.1}s",
        args.file.display(),
        info.num_frames,
        info.channels,
        info.sample_rate,
        info.duration_secs()
    );
    let stereo = to_stream_format(&samples, info.channels, info.sample_rate)?;

    let hw = global.audio_hw()?;
    hw.set_output_route(parse_output_route(&args.route)?);
    hw.set_screen_off(args.screen_off);

    let out = hw.open_output_stream(&mut AudioConfig::default())?;
    let running = running_flag()?;
    let chunk = out.buffer_size() / 2;

    println!("Playing... Press Ctrl+C to stop.");
    let mut underruns = 0usize;
    for block in stereo.chunks(chunk) {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match out.write(block) {
            Ok(_) => {}
            Err(Error::Underrun) => underruns += 1,
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(config) = out.device_config() {
        println!(
            "Device ran at {} Hz, {} ch, {}",
            config.rate, config.channels, config.format
        );
    }
    if underruns > 0 {
        println!("{underruns} underrun(s)");
    }
    Ok(())
}

/// Convert interleaved samples to 48 kHz stereo.
fn to_stream_format(samples: &[i16], channels: u16, rate: u32) -> anyhow::Result<Vec<i16>> {
    let stereo: Vec<i16> = match channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(usize::from(n))
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    };
    if rate == OUT_SAMPLING_RATE {
        return Ok(stereo);
    }

    let mut resampler = LinearResampler::new(rate, OUT_SAMPLING_RATE, 2)?;
    let frames_out = resampler.frames_out_for(stereo.len() / 2);
    let mut out = vec![0i16; frames_out * 2];
    let (_, produced) = resampler.resample_from_input(&stereo, &mut out);
    out.truncate(produced * 2);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_duplicated() {
        let out = to_stream_format(&[1, 2, 3], 1, 48000).unwrap();
        assert_eq!(out, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn extra_channels_are_dropped() {
        let out = to_stream_format(&[1, 2, 3, 4, 5, 6], 3, 48000).unwrap();
        assert_eq!(out, vec![1, 2, 4, 5]);
    }

    #[test]
    fn other_rates_are_converted() {
        let out = to_stream_format(&vec![0; 2 * 24000], 2, 24000).unwrap();
        assert_eq!(out.len(), 2 * 48000);
    }
}
