//! Routing bitmasks and the route categories derived from them.
//!
//! A route is a bitmask of logical destinations (output) or sources (input).
//! The bit values follow the platform audio device constants so masks can be
//! passed through unchanged from a `routing=<mask>` parameter string.
//!
//! Two families matter to the engines: the **main** family (speaker,
//! headphone, dock, built-in and headset microphones) and the **voice** family
//! (Bluetooth SCO). The two run on different PCM devices and different clock
//! domains, so flipping between them always forces a standby.

use core::fmt;

/// Direction of a PCM session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Playback (application → device).
    Output,
    /// Capture (device → application).
    Input,
}

impl Direction {
    /// Suffix used by ALSA device nodes (`p` for playback, `c` for capture).
    pub fn node_suffix(self) -> char {
        match self {
            Direction::Output => 'p',
            Direction::Input => 'c',
        }
    }

    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Output => "out",
            Direction::Input => "in",
        }
    }
}

/// Output routing bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputRoute(u32);

impl OutputRoute {
    /// Built-in loudspeaker.
    pub const SPEAKER: u32 = 0x2;
    /// Wired headset (with microphone).
    pub const WIRED_HEADSET: u32 = 0x4;
    /// Wired headphone (no microphone).
    pub const WIRED_HEADPHONE: u32 = 0x8;
    /// Bluetooth SCO.
    pub const BLUETOOTH_SCO: u32 = 0x10;
    /// Bluetooth SCO headset.
    pub const BLUETOOTH_SCO_HEADSET: u32 = 0x20;
    /// Bluetooth SCO car kit.
    pub const BLUETOOTH_SCO_CARKIT: u32 = 0x40;
    /// Digital audio out (HDMI).
    pub const AUX_DIGITAL: u32 = 0x400;
    /// Analog dock headset.
    pub const ANLG_DOCK_HEADSET: u32 = 0x800;
    /// Every SCO bit.
    pub const ALL_SCO: u32 =
        Self::BLUETOOTH_SCO | Self::BLUETOOTH_SCO_HEADSET | Self::BLUETOOTH_SCO_CARKIT;

    /// Wrap a raw mask.
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw mask value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when any SCO (voice family) bit is set.
    pub const fn is_sco(self) -> bool {
        self.0 & Self::ALL_SCO != 0
    }

    /// True when the SCO family differs between two routes.
    pub const fn sco_changed(self, other: Self) -> bool {
        self.is_sco() != other.is_sco()
    }

    /// Speaker bit set.
    pub const fn speaker(self) -> bool {
        self.0 & Self::SPEAKER != 0
    }

    /// Either wired headset or wired headphone set.
    pub const fn headphone(self) -> bool {
        self.0 & (Self::WIRED_HEADSET | Self::WIRED_HEADPHONE) != 0
    }

    /// Analog dock set.
    pub const fn docked(self) -> bool {
        self.0 & Self::ANLG_DOCK_HEADSET != 0
    }

    /// Digital audio out set.
    pub const fn aux_digital(self) -> bool {
        self.0 & Self::AUX_DIGITAL != 0
    }

    /// The route category used for card selection.
    ///
    /// With nothing analog selected the speaker is assumed. Later categories
    /// win: dock over headphone over speaker.
    pub fn slot(self) -> RouteSlot {
        if self.docked() {
            RouteSlot::Dock
        } else if self.headphone() {
            RouteSlot::Headphone
        } else {
            RouteSlot::Speaker
        }
    }
}

impl fmt::Display for OutputRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Input routing bitmask, with the direction bit already stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputRoute(u32);

impl InputRoute {
    /// Direction marker carried by input device values on the wire.
    pub const BIT_IN: u32 = 0x8000_0000;
    /// Built-in microphone.
    pub const BUILTIN_MIC: u32 = 0x4;
    /// Bluetooth SCO headset microphone.
    pub const BLUETOOTH_SCO_HEADSET: u32 = 0x8;
    /// Wired headset microphone.
    pub const WIRED_HEADSET: u32 = 0x10;
    /// Every SCO bit.
    pub const ALL_SCO: u32 = Self::BLUETOOTH_SCO_HEADSET;

    /// Wrap a raw mask, stripping the direction bit.
    pub const fn new(bits: u32) -> Self {
        Self(bits & !Self::BIT_IN)
    }

    /// Raw mask value (direction bit stripped).
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when the SCO headset microphone is selected.
    pub const fn is_sco(self) -> bool {
        self.0 & Self::ALL_SCO != 0
    }

    /// True when the SCO family differs between two routes.
    pub const fn sco_changed(self, other: Self) -> bool {
        self.is_sco() != other.is_sco()
    }

    /// Built-in microphone bit set.
    pub const fn main_mic(self) -> bool {
        self.0 & Self::BUILTIN_MIC != 0
    }

    /// Wired headset microphone bit set.
    pub const fn headset_mic(self) -> bool {
        self.0 & Self::WIRED_HEADSET != 0
    }

    /// The route category used for card selection (headset wins, main mic
    /// is assumed when nothing is set).
    pub fn slot(self) -> RouteSlot {
        if self.headset_mic() {
            RouteSlot::HeadsetMic
        } else {
            RouteSlot::MainMic
        }
    }
}

impl fmt::Display for InputRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Route category: the unit card overrides and the card cache are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteSlot {
    /// Output to the loudspeaker.
    Speaker,
    /// Output to wired headphones or headset.
    Headphone,
    /// Output to the analog dock.
    Dock,
    /// Capture from the built-in microphone.
    MainMic,
    /// Capture from the wired headset microphone.
    HeadsetMic,
    /// Digital audio (HDMI) in the given direction.
    Hdmi(Direction),
}

impl RouteSlot {
    /// Stable lowercase name, also used as the configuration table key.
    pub fn name(self) -> &'static str {
        match self {
            RouteSlot::Speaker => "speaker",
            RouteSlot::Headphone => "headphone",
            RouteSlot::Dock => "dock",
            RouteSlot::MainMic => "mic",
            RouteSlot::HeadsetMic => "headset",
            RouteSlot::Hdmi(_) => "hdmi",
        }
    }

    /// Direction this category belongs to.
    pub fn direction(self) -> Direction {
        match self {
            RouteSlot::Speaker | RouteSlot::Headphone | RouteSlot::Dock => Direction::Output,
            RouteSlot::MainMic | RouteSlot::HeadsetMic => Direction::Input,
            RouteSlot::Hdmi(direction) => direction,
        }
    }
}

/// Mixer path names for a pair of routes, in application order.
///
/// Paths are derived from the raw bits, so an output route with both speaker
/// and headphone bits set enables both paths.
pub fn mixer_paths(output: OutputRoute, input: InputRoute) -> Vec<&'static str> {
    let mut paths = Vec::with_capacity(5);
    if output.speaker() {
        paths.push("speaker");
    }
    if output.headphone() {
        paths.push("headphone");
    }
    if output.docked() {
        paths.push("dock");
    }
    if input.main_mic() {
        paths.push("main-mic");
    }
    if input.headset_mic() {
        paths.push("headset-mic");
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_route_strips_direction_bit() {
        let route = InputRoute::new(InputRoute::BIT_IN | InputRoute::BUILTIN_MIC);
        assert_eq!(route.bits(), InputRoute::BUILTIN_MIC);
        assert!(route.main_mic());
    }

    #[test]
    fn sco_flip_detection() {
        let speaker = OutputRoute::new(OutputRoute::SPEAKER);
        let sco = OutputRoute::new(OutputRoute::BLUETOOTH_SCO_HEADSET);
        assert!(speaker.sco_changed(sco));
        assert!(!sco.sco_changed(OutputRoute::new(OutputRoute::BLUETOOTH_SCO_CARKIT)));
        assert!(!speaker.sco_changed(OutputRoute::new(OutputRoute::WIRED_HEADPHONE)));
    }

    #[test]
    fn sco_flip_ignores_which_sco_bit() {
        let headset = OutputRoute::new(OutputRoute::BLUETOOTH_SCO_HEADSET);
        let both = OutputRoute::new(OutputRoute::BLUETOOTH_SCO | OutputRoute::SPEAKER);
        assert!(!headset.sco_changed(both));

        let mic = InputRoute::new(InputRoute::BUILTIN_MIC);
        let sco_mic = InputRoute::new(InputRoute::BLUETOOTH_SCO_HEADSET);
        assert!(mic.sco_changed(sco_mic));
        assert!(!sco_mic.sco_changed(InputRoute::new(
            InputRoute::BLUETOOTH_SCO_HEADSET | InputRoute::BUILTIN_MIC
        )));
    }

    #[test]
    fn output_slot_priority() {
        assert_eq!(OutputRoute::new(0).slot(), RouteSlot::Speaker);
        let both = OutputRoute::new(OutputRoute::SPEAKER | OutputRoute::WIRED_HEADSET);
        assert_eq!(both.slot(), RouteSlot::Headphone);
        let dock = OutputRoute::new(OutputRoute::WIRED_HEADPHONE | OutputRoute::ANLG_DOCK_HEADSET);
        assert_eq!(dock.slot(), RouteSlot::Dock);
    }

    #[test]
    fn input_slot_defaults_to_main_mic() {
        assert_eq!(InputRoute::new(0).slot(), RouteSlot::MainMic);
        let both = InputRoute::new(InputRoute::BUILTIN_MIC | InputRoute::WIRED_HEADSET);
        assert_eq!(both.slot(), RouteSlot::HeadsetMic);
    }

    #[test]
    fn mixer_paths_follow_bits() {
        let out = OutputRoute::new(OutputRoute::SPEAKER | OutputRoute::WIRED_HEADPHONE);
        let inp = InputRoute::new(InputRoute::WIRED_HEADSET);
        assert_eq!(mixer_paths(out, inp), vec!["speaker", "headphone", "headset-mic"]);
        assert!(mixer_paths(OutputRoute::new(0), InputRoute::new(0)).is_empty());
    }
}
