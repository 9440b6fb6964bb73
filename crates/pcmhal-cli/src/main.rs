//! pcmhal CLI - drive the audio data path from the command line.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pcmhal")]
#[command(author, version, about = "pcmhal audio data path CLI", long_about = None)]
struct Cli {
    /// Use simulated cards instead of real devices
    #[arg(long, global = true)]
    sim: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the PCM nodes card selection can see
    Cards(commands::cards::CardsArgs),

    /// Play a WAV file through an output stream
    Play(commands::play::PlayArgs),

    /// Record from an input stream into a WAV file
    Record(commands::record::RecordArgs),

    /// Show or initialize the configuration file
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = commands::common::Global {
        sim: cli.sim,
        config: cli.config,
    };

    match cli.command {
        Commands::Cards(args) => commands::cards::run(&global, args),
        Commands::Play(args) => commands::play::run(&global, args),
        Commands::Record(args) => commands::record::run(&global, args),
        Commands::Config(args) => commands::config::run(&global, args),
    }
}
