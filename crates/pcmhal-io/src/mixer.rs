//! Mixer that records and logs path changes.

use parking_lot::Mutex;
use std::sync::Arc;

use pcmhal_core::Mixer;

/// Logs each committed set of mixer paths.
///
/// Committed sets are also kept in a shared history so callers (and tests)
/// can see exactly what the coordinator applied.
#[derive(Debug, Default)]
pub struct TracingMixer {
    pending: Vec<String>,
    history: Arc<Mutex<Vec<Vec<String>>>>,
}

impl TracingMixer {
    /// New mixer with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the committed path sets, oldest first.
    pub fn history(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.history)
    }
}

impl Mixer for TracingMixer {
    fn reset(&mut self) {
        self.pending.clear();
    }

    fn apply_path(&mut self, name: &str) {
        self.pending.push(name.to_string());
    }

    fn commit(&mut self) {
        tracing::info!(paths = ?self.pending, "mixer paths applied");
        self.history.lock().push(std::mem::take(&mut self.pending));
    }
}
