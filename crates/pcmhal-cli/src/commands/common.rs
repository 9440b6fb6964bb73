//! Shared helpers for CLI commands.

use anyhow::{Context, bail};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pcmhal_config::{HalConfig, default_config_path};
use pcmhal_core::{InputRoute, OutputRoute};
use pcmhal_io::{AudioHw, ProcAsound, SimDriver, StaticCards};

/// Options shared by every command.
pub struct Global {
    pub sim: bool,
    pub config: Option<PathBuf>,
}

impl Global {
    /// Configuration file path in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Load the configuration, or defaults when the file does not exist.
    pub fn load_config(&self) -> anyhow::Result<HalConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(HalConfig::default());
        }
        let config = HalConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the audio device for this invocation.
    pub fn audio_hw(&self) -> anyhow::Result<AudioHw> {
        let builder = AudioHw::builder().config(self.load_config()?);
        let builder = if self.sim {
            builder
                .driver(Arc::new(SimDriver::new()))
                .enumerator(Arc::new(StaticCards::single(0)))
        } else {
            builder.enumerator(Arc::new(ProcAsound::default()))
        };
        Ok(builder.build())
    }
}

/// Parse a `|`-separated list of output route names.
pub fn parse_output_route(names: &str) -> anyhow::Result<u32> {
    let mut bits = 0;
    for name in names.split('|').map(str::trim) {
        bits |= match name {
            "speaker" => OutputRoute::SPEAKER,
            "headset" => OutputRoute::WIRED_HEADSET,
            "headphone" => OutputRoute::WIRED_HEADPHONE,
            "sco" => OutputRoute::BLUETOOTH_SCO,
            "hdmi" => OutputRoute::AUX_DIGITAL,
            "dock" => OutputRoute::ANLG_DOCK_HEADSET,
            other => bail!("unknown output route '{other}'"),
        };
    }
    Ok(bits)
}

/// Parse a `|`-separated list of input route names.
pub fn parse_input_route(names: &str) -> anyhow::Result<u32> {
    let mut bits = InputRoute::BIT_IN;
    for name in names.split('|').map(str::trim) {
        bits |= match name {
            "mic" => InputRoute::BUILTIN_MIC,
            "headset" => InputRoute::WIRED_HEADSET,
            "sco" => InputRoute::BLUETOOTH_SCO_HEADSET,
            other => bail!("unknown input route '{other}'"),
        };
    }
    Ok(bits)
}

/// Flag cleared by Ctrl+C.
pub fn running_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_routes_combine() {
        assert_eq!(
            parse_output_route("speaker|headphone").unwrap(),
            OutputRoute::SPEAKER | OutputRoute::WIRED_HEADPHONE
        );
        assert!(parse_output_route("laser").is_err());
    }

    #[test]
    fn input_routes_carry_direction_bit() {
        let bits = parse_input_route("headset").unwrap();
        assert_eq!(InputRoute::new(bits).bits(), InputRoute::WIRED_HEADSET);
        assert_ne!(bits & InputRoute::BIT_IN, 0);
    }

    #[test]
    fn missing_config_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let global = Global {
            sim: true,
            config: Some(dir.path().join("absent.toml")),
        };
        assert_eq!(global.load_config().unwrap(), HalConfig::default());
        assert!(global.audio_hw().is_ok());
    }
}
