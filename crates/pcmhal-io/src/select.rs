//! Card selection and pre-open bring-up.
//!
//! [`CardSelector`] answers "which PCM node serves this route" and keeps the
//! answer per route category for the life of the device. Configured
//! overrides are consulted before enumeration:
//!
//! 1. the HDMI override, when digital audio is wanted
//! 2. the category override (`[output.headphone] card = ...`)
//! 3. the direction default (`[output] card = ...`)
//! 4. every node the enumerator reports
//!
//! Candidates whose id contains `IntelHDMI` are skipped. Candidates whose id
//! names HDMI fill the HDMI slot instead of the category slot. Within a slot
//! the first candidate wins.
//!
//! The cache is never invalidated; hot-plugged cards are only seen by a new
//! selector.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::{Command, ExitStatus};
use std::sync::Arc;

use pcmhal_config::{HalConfig, slot_key};
use pcmhal_core::{
    DeviceLookup, Direction, InputRoute, OutputRoute, PcmConfig, PcmDevice, PcmInfo, RouteSlot,
    SampleFormat,
};

use crate::enumerate::CardEnumerator;

/// Runs external bring-up commands one at a time.
#[derive(Debug, Default)]
pub struct BringUp {
    lock: Mutex<()>,
}

impl BringUp {
    /// Run `command` through `sh -c`, waiting for it to exit.
    pub fn run(&self, command: &str) -> std::io::Result<ExitStatus> {
        let _guard = self.lock.lock();
        tracing::debug!(command, "running bring-up command");
        let status = Command::new("sh").arg("-c").arg(command).status()?;
        if !status.success() {
            tracing::warn!(command, %status, "bring-up command failed");
        }
        Ok(status)
    }
}

/// Route-driven card lookup with configured overrides.
pub struct CardSelector {
    config: HalConfig,
    enumerator: Arc<dyn CardEnumerator>,
    cache: Mutex<HashMap<RouteSlot, PcmInfo>>,
    bring_up: BringUp,
}

impl CardSelector {
    /// Selector over `enumerator` with `config` overrides.
    pub fn new(config: HalConfig, enumerator: Arc<dyn CardEnumerator>) -> Self {
        Self {
            config,
            enumerator,
            cache: Mutex::new(HashMap::new()),
            bring_up: BringUp::default(),
        }
    }

    /// Overrides in effect.
    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    /// Cached node for a category, if selection has filled it.
    pub fn cached(&self, slot: RouteSlot) -> Option<PcmInfo> {
        self.cache.lock().get(&slot).cloned()
    }

    fn category(direction: Direction, route: u32) -> RouteSlot {
        match direction {
            Direction::Output => OutputRoute::new(route).slot(),
            Direction::Input => InputRoute::new(route).slot(),
        }
    }

    /// Resolve an override node name, preferring the enumerated entry so the
    /// real id is known.
    fn resolve(&self, node: &str, listed: &[PcmInfo]) -> Option<PcmInfo> {
        listed
            .iter()
            .find(|info| info.node_name() == node)
            .cloned()
            .or_else(|| PcmInfo::from_node_name(node))
    }

    fn fill(&self, cache: &mut HashMap<RouteSlot, PcmInfo>, slot: RouteSlot, want_hdmi: bool) {
        let direction = slot.direction();
        let hdmi_slot = RouteSlot::Hdmi(direction);
        let listed = self.enumerator.list();

        let override_node = want_hdmi
            .then(|| self.config.card_for(hdmi_slot))
            .flatten()
            .or_else(|| self.config.card_for(slot))
            .or_else(|| self.config.default_card(direction));

        let candidates: Vec<PcmInfo> = match override_node {
            Some(node) => match self.resolve(node, &listed) {
                Some(info) => vec![info],
                None => {
                    tracing::warn!(slot = slot_key(slot), node, "ignoring malformed card override");
                    listed
                }
            },
            None => listed,
        };

        for info in candidates {
            if info.direction != direction || info.id.contains("IntelHDMI") {
                continue;
            }
            let target = if info.is_hdmi() { hdmi_slot } else { slot };
            cache.entry(target).or_insert_with(|| {
                tracing::info!(slot = slot_key(target), node = %info.node_name(), id = %info.id, "card selected");
                info
            });
        }
    }
}

impl DeviceLookup for CardSelector {
    fn select(&self, device: PcmDevice, direction: Direction, route: u32) -> Option<PcmInfo> {
        let slot = Self::category(direction, route);
        let hdmi_slot = RouteSlot::Hdmi(direction);
        let want_hdmi = self.config.prefer_hdmi.unwrap_or(device == PcmDevice::Hdmi);

        let mut cache = self.cache.lock();
        if !cache.contains_key(&slot) || (want_hdmi && !cache.contains_key(&hdmi_slot)) {
            self.fill(&mut cache, slot, want_hdmi);
        }

        let chosen = if want_hdmi {
            cache.get(&hdmi_slot).or_else(|| cache.get(&slot))
        } else {
            cache.get(&slot)
        };
        chosen.cloned()
    }

    fn prepare(&self, direction: Direction, route: u32, config: &mut PcmConfig) {
        let mut format = SampleFormat::S16Le;
        let slots: Vec<RouteSlot> = match direction {
            Direction::Output => {
                let route = OutputRoute::new(route);
                let mut slots = Vec::with_capacity(3);
                if route.headphone() {
                    slots.push(RouteSlot::Headphone);
                }
                if route.speaker() || !(route.headphone() || route.docked()) {
                    slots.push(RouteSlot::Speaker);
                }
                if route.docked() {
                    slots.push(RouteSlot::Dock);
                }
                slots
            }
            Direction::Input => {
                let route = InputRoute::new(route);
                let mut slots = Vec::with_capacity(2);
                if route.main_mic() || !route.headset_mic() {
                    slots.push(RouteSlot::MainMic);
                }
                if route.headset_mic() {
                    slots.push(RouteSlot::HeadsetMic);
                }
                slots
            }
        };

        let want_hdmi = self.config.prefer_hdmi.unwrap_or(
            direction == Direction::Output && OutputRoute::new(route).aux_digital(),
        );

        let hdmi = want_hdmi.then_some(RouteSlot::Hdmi(direction));
        for slot in slots.into_iter().chain(hdmi) {
            if let Some(command) = self.config.command_for(slot)
                && let Err(err) = self.bring_up.run(command)
            {
                tracing::warn!(slot = slot_key(slot), %err, "unable to run bring-up command");
            }
            if self.config.route(slot).is_some_and(|r| r.format.is_some()) {
                format = self.config.format_for(slot);
            }
        }

        if config.format != format {
            tracing::debug!(from = %config.format, to = %format, "format override");
        }
        config.format = format;
    }
}

impl std::fmt::Debug for CardSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSelector")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::StaticCards;
    use pcmhal_config::RouteOverride;

    fn node(card: u32, device: u32, id: &str, direction: Direction) -> PcmInfo {
        PcmInfo {
            card,
            device,
            id: id.into(),
            name: id.into(),
            direction,
        }
    }

    fn cards() -> Arc<StaticCards> {
        Arc::new(StaticCards::new(vec![
            node(0, 3, "IntelHDMI", Direction::Output),
            node(0, 0, "Analog", Direction::Output),
            node(0, 0, "Analog", Direction::Input),
            node(1, 3, "HDMI 0", Direction::Output),
            node(2, 0, "USB", Direction::Output),
        ]))
    }

    #[test]
    fn first_analog_match_wins() {
        let selector = CardSelector::new(HalConfig::default(), cards());
        let info = selector
            .select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER)
            .unwrap();
        assert_eq!(info.node_name(), "pcmC0D0p");
        let info = selector
            .select(PcmDevice::Main, Direction::Input, InputRoute::BUILTIN_MIC)
            .unwrap();
        assert_eq!(info.node_name(), "pcmC0D0c");
    }

    #[test]
    fn hdmi_goes_to_its_own_slot() {
        let selector = CardSelector::new(HalConfig::default(), cards());
        selector.select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER);
        let hdmi = selector.cached(RouteSlot::Hdmi(Direction::Output)).unwrap();
        assert_eq!(hdmi.card, 1);

        let info = selector
            .select(PcmDevice::Hdmi, Direction::Output, OutputRoute::AUX_DIGITAL)
            .unwrap();
        assert_eq!(info.node_name(), "pcmC1D3p");
    }

    #[test]
    fn category_override_is_used() {
        let mut config = HalConfig::default();
        config.output.headphone = Some(RouteOverride::with_card("pcmC2D0p"));
        let selector = CardSelector::new(config, cards());

        let info = selector
            .select(PcmDevice::Main, Direction::Output, OutputRoute::WIRED_HEADPHONE)
            .unwrap();
        assert_eq!(info.id, "USB");
        let info = selector
            .select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER)
            .unwrap();
        assert_eq!(info.card, 0);
    }

    #[test]
    fn voice_device_opens_the_route_slot_node() {
        let selector = CardSelector::new(HalConfig::default(), cards());
        let main = selector
            .select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER)
            .unwrap();
        let voice = selector
            .select(PcmDevice::Sco, Direction::Output, OutputRoute::BLUETOOTH_SCO)
            .unwrap();
        assert_eq!(voice, main);
        assert_eq!(voice.node_name(), "pcmC0D0p");
    }

    #[test]
    fn selection_is_memoized() {
        let selector = CardSelector::new(HalConfig::default(), cards());
        let first = selector.select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER);
        let again = selector.select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER);
        assert_eq!(first, again);
    }

    #[test]
    fn nothing_listed_selects_nothing() {
        let selector = CardSelector::new(HalConfig::default(), Arc::new(StaticCards::default()));
        assert!(
            selector
                .select(PcmDevice::Main, Direction::Output, OutputRoute::SPEAKER)
                .is_none()
        );
    }

    #[test]
    fn prepare_applies_formats_hdmi_last() {
        let config = HalConfig::from_toml(
            r#"
[output.speaker]
format = "s32le"
[output.hdmi]
format = "u8"
"#,
        )
        .unwrap();
        let selector = CardSelector::new(config, cards());

        let mut pcm = PcmConfig::OUTPUT;
        selector.prepare(Direction::Output, OutputRoute::SPEAKER, &mut pcm);
        assert_eq!(pcm.format, SampleFormat::S32Le);

        let mut pcm = PcmConfig::OUTPUT;
        selector.prepare(
            Direction::Output,
            OutputRoute::SPEAKER | OutputRoute::AUX_DIGITAL,
            &mut pcm,
        );
        assert_eq!(pcm.format, SampleFormat::U8);

        let mut pcm = PcmConfig::INPUT;
        selector.prepare(Direction::Input, InputRoute::BUILTIN_MIC, &mut pcm);
        assert_eq!(pcm.format, SampleFormat::S16Le);
    }

    #[test]
    fn bring_up_runs_commands() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let mut config = HalConfig::default();
        config.input.mic = Some(RouteOverride {
            command: Some(format!("touch '{}'", marker.display())),
            ..RouteOverride::default()
        });
        let selector = CardSelector::new(config, cards());
        let mut pcm = PcmConfig::INPUT;
        selector.prepare(Direction::Input, InputRoute::BUILTIN_MIC, &mut pcm);
        assert!(marker.exists());
    }
}
