//! Effect trait definition
//!
//! Base trait for every stage kernel the graph executor runs.

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Base trait for all DSP effects
///
/// Effects process audio buffers in-place. A freshly built effect is
/// prepared once for the buffer's sample rate and channel count, then
/// processes the whole buffer in a single call.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()>;

    /// Prepare the effect for processing
    ///
    /// Called before the first `process` and whenever the sample rate or
    /// channel count changes.
    fn prepare(&mut self, sample_rate: u32, num_channels: usize);

    /// Reset effect state
    ///
    /// Clears any internal state (filter history, envelopes, look-ahead).
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;
}
