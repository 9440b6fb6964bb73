//! Capture from an input stream into a WAV file.

use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use pcmhal_core::{AudioConfig, ChannelLayout, DcRemover};
use pcmhal_io::write_wav_i16;

use super::common::{Global, parse_input_route, running_flag};

#[derive(Args)]
pub struct RecordArgs {
    /// Output WAV file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Recording length in seconds
    #[arg(short, long, default_value = "5")]
    seconds: f32,

    /// Stream sample rate in Hz
    #[arg(long, default_value = "16000")]
    rate: u32,

    /// Input route: "mic", "headset" or "sco"
    #[arg(short = 'i', long, default_value = "mic")]
    route: String,

    /// Remove DC offset before writing
    #[arg(long)]
    dc_block: bool,

    /// Mute the microphone (records silence, useful for testing routing)
    #[arg(long)]
    mute: bool,
}

pub fn run(global: &Global, args: RecordArgs) -> anyhow::Result<()> {
    let hw = global.audio_hw()?;
    hw.set_input_route(parse_input_route(&args.route)?);
    hw.set_mic_mute(args.mute);

    let mut config = AudioConfig::new(args.rate, ChannelLayout::Mono);
    let input = hw.open_input_stream(&mut config)?;
    if args.dc_block {
        input.add_effect(Box::new(DcRemover::new()))?;
    }

    let total = (args.seconds.max(0.0) * args.rate as f32) as usize;
    let chunk = input.buffer_size() / 2;
    let running = running_flag()?;
    let mut recorded = Vec::with_capacity(total);
    let mut buf = vec![0i16; chunk];

    println!(
        "Recording {:.1}s at {} Hz... Press Ctrl+C to stop.",
        args.seconds, args.rate
    );
    while recorded.len() < total && running.load(Ordering::SeqCst) {
        let want = chunk.min(total - recorded.len());
        input.read(&mut buf[..want]);
        recorded.extend_from_slice(&buf[..want]);
    }
    if let Some(device) = input.device_config() {
        tracing::info!(
            rate = device.rate,
            channels = device.channels,
            format = %device.format,
            "capture device"
        );
    }
    drop(input);

    write_wav_i16(&args.file, &recorded, 1, args.rate)?;
    println!(
        "Wrote {} frames to {}",
        recorded.len(),
        args.file.display()
    );
    Ok(())
}
