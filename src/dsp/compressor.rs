//! Compressor effect
//!
//! A feed-forward dynamics processor with linked-channel peak detection, a
//! quadratic soft knee and attack/release smoothing of the gain reduction.
//! Makeup gain is derived from the static curve the same way a standard
//! dynamics-compressor node does it: the reduction applied to a full-scale
//! signal, raised to the power 0.6.

use crate::dsp::effect::Effect;
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const MIN_THRESHOLD_DB: f32 = -60.0;
const MAX_THRESHOLD_DB: f32 = 0.0;
const MIN_RATIO: f32 = 1.0;
const MAX_RATIO: f32 = 20.0;
const MIN_ATTACK_MS: f32 = 0.1;
const MAX_ATTACK_MS: f32 = 100.0;
const MIN_RELEASE_MS: f32 = 10.0;
const MAX_RELEASE_MS: f32 = 1000.0;
const MAX_KNEE_DB: f32 = 24.0;

/// Exponent applied to the full-scale gain when deriving makeup gain
const MAKEUP_EXPONENT: f32 = 0.6;

/// Detector floor for silent input
const DETECTOR_FLOOR_DB: f32 = -120.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate envelope coefficient from time constant
#[inline]
pub(crate) fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * sample_rate / 1000.0;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

fn check_range(param: &str, value: f32, min: f32, max: f32, unit: &str) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PreviewError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: format!("{} to {}{}", min, max, unit),
        })
    }
}

// ============================================================================
// Compressor Parameters
// ============================================================================

/// Static and timing parameters of a compressor stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in milliseconds (0.1 to 100 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (10 to 1000 ms)
    pub release_ms: f32,
    /// Knee width in dB (0 = hard knee)
    pub knee_db: f32,
}

impl CompressorParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        check_range("threshold_db", self.threshold_db, MIN_THRESHOLD_DB, MAX_THRESHOLD_DB, " dB")?;
        check_range("ratio", self.ratio, MIN_RATIO, MAX_RATIO, ":1")?;
        check_range("attack_ms", self.attack_ms, MIN_ATTACK_MS, MAX_ATTACK_MS, " ms")?;
        check_range("release_ms", self.release_ms, MIN_RELEASE_MS, MAX_RELEASE_MS, " ms")?;
        check_range("knee_db", self.knee_db, 0.0, MAX_KNEE_DB, " dB")?;
        Ok(())
    }

    /// Output level of the static curve for an input level, both in dB
    pub fn static_curve_db(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        let knee = self.knee_db;

        if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            input_db + (1.0 / self.ratio - 1.0) * x * x / (2.0 * knee)
        } else if over > 0.0 {
            self.threshold_db + over / self.ratio
        } else {
            input_db
        }
    }

    /// Makeup gain in dB
    pub fn makeup_gain_db(&self) -> f32 {
        let full_scale_gain_db = self.static_curve_db(0.0);
        -full_scale_gain_db * MAKEUP_EXPONENT
    }
}

// ============================================================================
// Compressor Effect
// ============================================================================

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    attack_coeff: f32,
    release_coeff: f32,
    makeup_linear: f32,
    /// Smoothed gain reduction in dB (<= 0)
    envelope_db: f32,
}

impl Compressor {
    /// Create a compressor with validated parameters
    pub fn new(params: CompressorParams) -> Result<Self> {
        params.validate()?;
        let mut comp = Self {
            params,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup_linear: db_to_linear(params.makeup_gain_db()),
            envelope_db: 0.0,
        };
        comp.update_coefficients(48000);
        Ok(comp)
    }

    /// Get the current parameters
    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Current gain reduction in dB for metering
    pub fn gain_reduction_db(&self) -> f32 {
        self.envelope_db
    }

    fn update_coefficients(&mut self, sample_rate: u32) {
        self.attack_coeff = time_to_coeff(self.params.attack_ms, sample_rate as f32);
        self.release_coeff = time_to_coeff(self.params.release_ms, sample_rate as f32);
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let num_channels = buffer.num_channels();

        for frame in 0..buffer.num_samples() {
            // Linked detection: loudest channel drives every channel
            let mut peak = 0.0_f32;
            for ch in 0..num_channels {
                peak = peak.max(buffer.channel(ch)[frame].abs());
            }

            let input_db = linear_to_db(peak).max(DETECTOR_FLOOR_DB);
            let target_db = self.params.static_curve_db(input_db) - input_db;

            let coeff = if target_db < self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target_db;

            let gain = db_to_linear(self.envelope_db) * self.makeup_linear;
            for ch in 0..num_channels {
                buffer.channel_mut(ch)[frame] *= gain;
            }
        }

        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32, _num_channels: usize) {
        self.update_coefficients(sample_rate);
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "compressor"
    }
}

// ============================================================================
// Tests
// ============================================================================
