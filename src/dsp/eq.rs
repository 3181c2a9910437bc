//! Biquad filter stage
//!
//! A single second-order section covering the five filter shapes a mastering
//! chain needs: high-pass, low-pass, peaking, low shelf and high shelf.
//! Coefficients follow the Audio EQ Cookbook; state is kept in f64.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::dsp::effect::Effect;
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const MIN_FREQUENCY_HZ: f32 = 10.0;
const MAX_FREQUENCY_HZ: f32 = 22000.0;
const MIN_Q: f32 = 0.1;
const MAX_Q: f32 = 18.0;
const MAX_GAIN_DB: f32 = 24.0;

/// Gains below this magnitude leave peaking and shelf filters bypassed
const BYPASS_GAIN_DB: f32 = 0.01;

// ============================================================================
// Filter Kind
// ============================================================================

/// Filter shape of a biquad stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove below frequency
    HighPass,
    /// Remove above frequency
    LowPass,
    /// Bell curve boost/cut
    Peaking,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
}

impl FilterKind {
    /// Whether the filter's gain parameter changes its response
    pub fn uses_gain(&self) -> bool {
        matches!(
            self,
            FilterKind::Peaking | FilterKind::LowShelf | FilterKind::HighShelf
        )
    }
}

// ============================================================================
// Biquad Coefficients and State
// ============================================================================

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    const UNITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        // Keep the corner well below Nyquist at low sample rates
        let freq = frequency.min(sample_rate * 0.45);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterKind::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterKind::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Process a single sample (Direct Form I)
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

// ============================================================================
// Biquad Filter Effect
// ============================================================================

/// One biquad filter stage applied independently to every channel
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    frequency_hz: f32,
    q: f32,
    gain_db: f32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl BiquadFilter {
    /// Create a validated filter
    ///
    /// # Errors
    /// `InvalidParameter` when frequency, Q or gain is outside its range.
    pub fn new(kind: FilterKind, frequency_hz: f32, q: f32, gain_db: f32) -> Result<Self> {
        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
            return Err(PreviewError::InvalidParameter {
                param: "frequency_hz".to_string(),
                value: frequency_hz.to_string(),
                expected: format!("{}-{} Hz", MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ),
            });
        }

        if !(MIN_Q..=MAX_Q).contains(&q) {
            return Err(PreviewError::InvalidParameter {
                param: "q".to_string(),
                value: q.to_string(),
                expected: format!("{} to {}", MIN_Q, MAX_Q),
            });
        }

        if !(-MAX_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
            return Err(PreviewError::InvalidParameter {
                param: "gain_db".to_string(),
                value: gain_db.to_string(),
                expected: format!("-{0} to +{0} dB", MAX_GAIN_DB),
            });
        }

        Ok(Self {
            kind,
            frequency_hz,
            q,
            gain_db,
            coeffs: BiquadCoeffs::UNITY,
            states: Vec::new(),
        })
    }

    /// Filter shape
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Check if this filter leaves audio untouched
    fn is_bypass(&self) -> bool {
        self.kind.uses_gain() && self.gain_db.abs() < BYPASS_GAIN_DB
    }
}

impl Effect for BiquadFilter {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        if self.is_bypass() {
            return Ok(());
        }

        if self.states.len() < buffer.num_channels() {
            self.states
                .resize_with(buffer.num_channels(), BiquadState::default);
        }

        let coeffs = self.coeffs;
        for (ch, state) in self.states.iter_mut().enumerate().take(buffer.num_channels()) {
            for sample in buffer.channel_mut(ch) {
                *sample = state.process(*sample as f64, &coeffs) as f32;
            }
        }

        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32, num_channels: usize) {
        self.coeffs = BiquadCoeffs::calculate(
            self.kind,
            sample_rate as f64,
            self.frequency_hz as f64,
            self.gain_db as f64,
            self.q as f64,
        );
        self.states = vec![BiquadState::default(); num_channels];
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            *state = BiquadState::default();
        }
    }

    fn effect_type(&self) -> &'static str {
        "filter"
    }
}

// ============================================================================
// Tests
// ============================================================================
