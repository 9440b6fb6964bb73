//! Integration tests for pcmhal-config.
//!
//! These tests exercise file round-trips and error reporting end to end.

use pcmhal_config::{ConfigError, HalConfig, RouteOverride};
use pcmhal_core::{Direction, RouteSlot, SampleFormat};
use tempfile::TempDir;

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("hal.toml");

    let mut config = HalConfig {
        prefer_hdmi: Some(false),
        ..HalConfig::default()
    };
    config.output.card = Some("pcmC0D0p".into());
    config.output.speaker = Some(RouteOverride {
        card: Some("pcmC1D0p".into()),
        command: Some("echo speaker".into()),
        format: Some("s32le".into()),
    });
    config.input.headset = Some(RouteOverride::with_card("pcmC1D0c"));

    config.save(&path).expect("save should create parent dirs");
    let loaded = HalConfig::load(&path).unwrap();

    assert_eq!(loaded, config);
    assert_eq!(loaded.format_for(RouteSlot::Speaker), SampleFormat::S32Le);
    assert_eq!(loaded.card_for(RouteSlot::HeadsetMic), Some("pcmC1D0c"));
    assert_eq!(loaded.default_card(Direction::Output), Some("pcmC0D0p"));
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = HalConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_load_malformed_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[output\ncard = ").unwrap();
    assert!(matches!(
        HalConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_hdmi_tables_are_per_direction() {
    let config = HalConfig::from_toml(
        r#"
[output.hdmi]
card = "pcmC2D3p"
format = "s32le"

[input.hdmi]
card = "pcmC2D0c"
"#,
    )
    .unwrap();
    assert_eq!(
        config.card_for(RouteSlot::Hdmi(Direction::Output)),
        Some("pcmC2D3p")
    );
    assert_eq!(
        config.card_for(RouteSlot::Hdmi(Direction::Input)),
        Some("pcmC2D0c")
    );
    assert_eq!(
        config.format_for(RouteSlot::Hdmi(Direction::Input)),
        SampleFormat::S16Le
    );
}
