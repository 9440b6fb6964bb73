//! Sources of candidate PCM nodes for card selection.

use std::path::PathBuf;

use pcmhal_core::{Direction, PcmInfo};

/// Lists the PCM nodes present on the system.
pub trait CardEnumerator: Send + Sync {
    /// Every node, in system order.
    fn list(&self) -> Vec<PcmInfo>;
}

/// Reads the kernel's PCM list (`/proc/asound/pcm`).
///
/// Each line has the form
/// `CC-DD: id : name : playback N : capture N`; one [`PcmInfo`] is produced
/// per direction the line advertises.
#[derive(Debug, Clone)]
pub struct ProcAsound {
    path: PathBuf,
}

impl ProcAsound {
    /// Read from a non-default location.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the contents of a PCM list.
    pub fn parse(content: &str) -> Vec<PcmInfo> {
        content.lines().flat_map(parse_line).collect()
    }
}

impl Default for ProcAsound {
    fn default() -> Self {
        Self::with_path("/proc/asound/pcm")
    }
}

impl CardEnumerator for ProcAsound {
    fn list(&self) -> Vec<PcmInfo> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "unable to read pcm list");
                Vec::new()
            }
        }
    }
}

fn parse_line(line: &str) -> Vec<PcmInfo> {
    let Some((index, rest)) = line.split_once(':') else {
        return Vec::new();
    };
    let Some((card, device)) = index.trim().split_once('-') else {
        return Vec::new();
    };
    let (Ok(card), Ok(device)) = (card.parse::<u32>(), device.parse::<u32>()) else {
        return Vec::new();
    };

    let fields: Vec<&str> = rest.split(" : ").map(str::trim).collect();
    let id = fields.first().copied().unwrap_or_default();
    let name = fields.get(1).copied().unwrap_or(id);

    fields
        .iter()
        .skip(2)
        .filter_map(|field| {
            if field.starts_with("playback") {
                Some(Direction::Output)
            } else if field.starts_with("capture") {
                Some(Direction::Input)
            } else {
                None
            }
        })
        .map(|direction| PcmInfo {
            card,
            device,
            id: id.to_string(),
            name: name.to_string(),
            direction,
        })
        .collect()
}

/// A fixed list of nodes.
#[derive(Debug, Clone, Default)]
pub struct StaticCards {
    cards: Vec<PcmInfo>,
}

impl StaticCards {
    /// Serve exactly these nodes.
    pub fn new(cards: Vec<PcmInfo>) -> Self {
        Self { cards }
    }

    /// One analog card with device 0 in both directions.
    pub fn single(card: u32) -> Self {
        let node = |direction| PcmInfo {
            card,
            device: 0,
            id: format!("card{card}"),
            name: format!("Card {card}"),
            direction,
        };
        Self::new(vec![node(Direction::Output), node(Direction::Input)])
    }
}

impl CardEnumerator for StaticCards {
    fn list(&self) -> Vec<PcmInfo> {
        self.cards.clone()
    }
}
