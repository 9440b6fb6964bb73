//! Configuration for the pcmhal audio data path.
//!
//! The driver reads three kinds of overrides from a TOML file, each keyed by
//! route category (speaker, headphone, dock, mic, headset, hdmi):
//!
//! - **card**: the PCM node to use instead of enumerating the system
//! - **command**: a bring-up shell command run right before the device opens
//! - **format**: the physical sample encoding to request
//!
//! It also parses the flat `key=value;...` parameter strings streams accept
//! at runtime.
//!
//! # Example
//!
//! ```rust
//! use pcmhal_config::{HalConfig, StrParms};
//! use pcmhal_core::{RouteSlot, SampleFormat};
//!
//! let config = HalConfig::from_toml(r#"
//! [output.speaker]
//! card = "pcmC1D0p"
//! format = "s32le"
//! "#).unwrap();
//! assert_eq!(config.card_for(RouteSlot::Speaker), Some("pcmC1D0p"));
//! assert_eq!(config.format_for(RouteSlot::Speaker), SampleFormat::S32Le);
//!
//! let parms = StrParms::parse("routing=8;screen_state=off");
//! assert_eq!(parms.get_int("routing"), Some(8));
//! ```

mod error;
mod hal;
mod params;

/// Platform-specific configuration paths.
pub mod paths;

pub use error::ConfigError;
pub use hal::{HalConfig, InputConfig, OutputConfig, RouteOverride, slot_key};
pub use params::StrParms;
pub use paths::{default_config_path, ensure_user_config_dir, user_config_dir};
