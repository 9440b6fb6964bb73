//! Hardware mixer path application.

/// Applies named mixer paths ("speaker", "main-mic", ...) to the hardware.
///
/// Paths accumulate between [`Mixer::reset`] and [`Mixer::commit`]; only the
/// commit touches the hardware.
pub trait Mixer: Send {
    /// Drop every accumulated path, returning to the default state.
    fn reset(&mut self);

    /// Enable a named path.
    fn apply_path(&mut self, name: &str);

    /// Push the accumulated state to the hardware.
    fn commit(&mut self);
}
