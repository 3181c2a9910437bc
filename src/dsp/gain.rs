//! Gain Effect
//!
//! Static output gain in dB. Tier chains end with a unity gain stage; level
//! matching between tiers happens later in the normalizer.

use crate::dsp::effect::Effect;
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Simple gain adjustment effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    gain_db: f32,
    gain_linear: f32,
}

impl Gain {
    /// Create a new gain effect
    ///
    /// # Errors
    /// `InvalidParameter` outside -96 to +24 dB.
    pub fn new(gain_db: f32) -> Result<Self> {
        if !gain_db.is_finite() || !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
            return Err(PreviewError::InvalidParameter {
                param: "gain_db".to_string(),
                value: gain_db.to_string(),
                expected: format!("{} to +{} dB", MIN_GAIN_DB, MAX_GAIN_DB),
            });
        }

        Ok(Self {
            gain_db,
            gain_linear: db_to_linear(gain_db),
        })
    }

    /// Get the current gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        // Unity gain optimization
        if (self.gain_linear - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }

        buffer.apply_gain(self.gain_linear);
        Ok(())
    }

    fn prepare(&mut self, _sample_rate: u32, _num_channels: usize) {}

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "gain"
    }
}

// ============================================================================
// Tests
// ============================================================================
