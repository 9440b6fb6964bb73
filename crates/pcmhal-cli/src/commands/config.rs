//! Configuration file inspection.

use anyhow::bail;
use clap::Args;

use pcmhal_config::HalConfig;

use super::common::Global;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write a default configuration file if none exists
    #[arg(long)]
    init: bool,
}

pub fn run(global: &Global, args: ConfigArgs) -> anyhow::Result<()> {
    let path = global.config_path();

    if args.init {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        HalConfig::default().save(&path)?;
        println!("Created {}", path.display());
        return Ok(());
    }

    println!("Configuration: {}", path.display());
    if !path.exists() {
        println!("  (not present, using defaults)");
    }
    let config = global.load_config()?;
    let text = config.to_toml()?;
    if text.trim().is_empty() {
        println!("  (empty)");
    } else {
        println!();
        print!("{text}");
    }
    Ok(())
}
