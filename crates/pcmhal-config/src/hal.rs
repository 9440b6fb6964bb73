//! Persisted card, bring-up and format overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use pcmhal_core::{Direction, PcmInfo, RouteSlot, SampleFormat};

use crate::error::ConfigError;
use crate::paths;

/// Overrides for one route category.
///
/// # TOML Format
///
/// ```toml
/// [output.speaker]
/// card = "pcmC1D0p"
/// command = "amixer -c1 sset Speaker on"
/// format = "s32le"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouteOverride {
    /// PCM node to use for this category instead of enumerating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,

    /// Shell command run right before a session on this category opens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Physical encoding to request (`s16le`, `s32le`, `u8`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl RouteOverride {
    /// Override with only a card set.
    pub fn with_card(card: impl Into<String>) -> Self {
        Self {
            card: Some(card.into()),
            ..Self::default()
        }
    }
}

/// Playback overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Default playback node when no category override matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    /// Loudspeaker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<RouteOverride>,
    /// Wired headphone / headset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headphone: Option<RouteOverride>,
    /// Analog dock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dock: Option<RouteOverride>,
    /// Digital audio out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdmi: Option<RouteOverride>,
}

/// Capture overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputConfig {
    /// Default capture node when no category override matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    /// Built-in microphone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic: Option<RouteOverride>,
    /// Wired headset microphone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headset: Option<RouteOverride>,
    /// Digital audio in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdmi: Option<RouteOverride>,
}

/// Top-level configuration file.
///
/// Every field is optional; an empty file means "enumerate cards, run no
/// commands, use 16-bit everywhere".
///
/// # TOML Format
///
/// ```toml
/// prefer_hdmi = false
///
/// [output]
/// card = "pcmC0D0p"
///
/// [output.headphone]
/// card = "pcmC1D0p"
/// format = "s32le"
///
/// [input.mic]
/// command = "amixer -c0 sset Capture on"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HalConfig {
    /// Force (or forbid) the digital-audio card regardless of route. Unset
    /// follows the route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_hdmi: Option<bool>,

    /// Playback overrides.
    pub output: OutputConfig,

    /// Capture overrides.
    pub input: InputConfig,
}

impl HalConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load the user configuration file, or defaults when it does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = paths::default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Overrides for a route category, if any.
    pub fn route(&self, slot: RouteSlot) -> Option<&RouteOverride> {
        match slot {
            RouteSlot::Speaker => self.output.speaker.as_ref(),
            RouteSlot::Headphone => self.output.headphone.as_ref(),
            RouteSlot::Dock => self.output.dock.as_ref(),
            RouteSlot::MainMic => self.input.mic.as_ref(),
            RouteSlot::HeadsetMic => self.input.headset.as_ref(),
            RouteSlot::Hdmi(Direction::Output) => self.output.hdmi.as_ref(),
            RouteSlot::Hdmi(Direction::Input) => self.input.hdmi.as_ref(),
        }
    }

    /// Direction-wide default card.
    pub fn default_card(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Output => self.output.card.as_deref(),
            Direction::Input => self.input.card.as_deref(),
        }
    }

    /// Card override for a category.
    pub fn card_for(&self, slot: RouteSlot) -> Option<&str> {
        self.route(slot).and_then(|r| r.card.as_deref())
    }

    /// Bring-up command for a category.
    pub fn command_for(&self, slot: RouteSlot) -> Option<&str> {
        self.route(slot).and_then(|r| r.command.as_deref())
    }

    /// Physical encoding for a category.
    ///
    /// Unset means 16-bit. An unsupported value is logged and also falls back
    /// to 16-bit; use [`HalConfig::validate`] to reject it up front.
    pub fn format_for(&self, slot: RouteSlot) -> SampleFormat {
        let Some(value) = self.route(slot).and_then(|r| r.format.as_deref()) else {
            return SampleFormat::S16Le;
        };
        match value.parse() {
            Ok(format) => format,
            Err(_) => {
                tracing::warn!(
                    slot = slot_key(slot),
                    value,
                    "ignoring unsupported format override"
                );
                SampleFormat::S16Le
            }
        }
    }

    /// Check every card and format override.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, card) in [
            ("output", self.output.card.as_deref()),
            ("input", self.input.card.as_deref()),
        ] {
            if let Some(card) = card {
                check_card(key, card)?;
            }
        }
        for slot in ALL_SLOTS {
            let Some(route) = self.route(slot) else {
                continue;
            };
            if let Some(card) = route.card.as_deref() {
                check_card(slot_key(slot), card)?;
            }
            if let Some(format) = route.format.as_deref()
                && format.parse::<SampleFormat>().is_err()
            {
                return Err(ConfigError::InvalidFormat {
                    slot: slot_key(slot).to_string(),
                    value: format.to_string(),
                });
            }
        }
        Ok(())
    }
}

const ALL_SLOTS: [RouteSlot; 7] = [
    RouteSlot::Speaker,
    RouteSlot::Headphone,
    RouteSlot::Dock,
    RouteSlot::Hdmi(Direction::Output),
    RouteSlot::MainMic,
    RouteSlot::HeadsetMic,
    RouteSlot::Hdmi(Direction::Input),
];

/// Dotted configuration key of a category, e.g. `output.speaker`.
pub fn slot_key(slot: RouteSlot) -> &'static str {
    match slot {
        RouteSlot::Speaker => "output.speaker",
        RouteSlot::Headphone => "output.headphone",
        RouteSlot::Dock => "output.dock",
        RouteSlot::Hdmi(Direction::Output) => "output.hdmi",
        RouteSlot::MainMic => "input.mic",
        RouteSlot::HeadsetMic => "input.headset",
        RouteSlot::Hdmi(Direction::Input) => "input.hdmi",
    }
}

fn check_card(key: &str, card: &str) -> Result<(), ConfigError> {
    if PcmInfo::from_node_name(card).is_some() {
        Ok(())
    } else {
        Err(ConfigError::InvalidCard {
            slot: key.to_string(),
            value: card.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
prefer_hdmi = true

[output]
card = "pcmC0D0p"

[output.headphone]
card = "pcmC1D0p"
command = "true"
format = "s32le"

[output.hdmi]
format = "u8"

[input.mic]
format = "bogus"
"#;

    #[test]
    fn parses_nested_tables() {
        let config = HalConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.prefer_hdmi, Some(true));
        assert_eq!(config.default_card(Direction::Output), Some("pcmC0D0p"));
        assert_eq!(config.default_card(Direction::Input), None);
        assert_eq!(config.card_for(RouteSlot::Headphone), Some("pcmC1D0p"));
        assert_eq!(config.command_for(RouteSlot::Headphone), Some("true"));
        assert_eq!(config.command_for(RouteSlot::Speaker), None);
    }

    #[test]
    fn format_lookup_with_fallback() {
        let config = HalConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.format_for(RouteSlot::Headphone), SampleFormat::S32Le);
        assert_eq!(
            config.format_for(RouteSlot::Hdmi(Direction::Output)),
            SampleFormat::U8
        );
        assert_eq!(config.format_for(RouteSlot::MainMic), SampleFormat::S16Le);
        assert_eq!(config.format_for(RouteSlot::Dock), SampleFormat::S16Le);
    }

    #[test]
    fn validate_reports_bad_format() {
        let config = HalConfig::from_toml(SAMPLE).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidFormat { ref slot, .. } if slot == "input.mic"),
            "got {err}"
        );
    }

    #[test]
    fn validate_reports_bad_card() {
        let mut config = HalConfig::default();
        config.input.card = Some("hw:0,0".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCard { .. })
        ));
    }

    #[test]
    fn empty_config_is_valid() {
        let config = HalConfig::from_toml("").unwrap();
        assert_eq!(config, HalConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_roundtrip_skips_unset_keys() {
        let mut config = HalConfig::default();
        config.output.dock = Some(RouteOverride::with_card("pcmC2D0p"));
        let text = config.to_toml().unwrap();
        assert!(!text.contains("prefer_hdmi"));
        assert!(text.contains("pcmC2D0p"));
        assert_eq!(HalConfig::from_toml(&text).unwrap(), config);
    }
}
