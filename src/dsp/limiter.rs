//! Limiter Effect
//!
//! Peak limiter with optional look-ahead. The detector sees the loudest
//! frame in the upcoming look-ahead window, so gain reduction is already in
//! place when a transient arrives. Rendering is offline, which means the
//! look-ahead adds no output latency. At brickwall ratios the output is also
//! hard-ceilinged at the threshold.

use std::collections::VecDeque;

use crate::dsp::compressor::time_to_coeff;
use crate::dsp::effect::Effect;
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const MIN_THRESHOLD_DB: f32 = -24.0;
const MAX_THRESHOLD_DB: f32 = 0.0;
const MIN_RATIO: f32 = 1.0;
const MAX_RATIO: f32 = 100.0;
const MIN_TIME_MS: f32 = 0.01;
const MAX_ATTACK_MS: f32 = 100.0;
const MAX_RELEASE_MS: f32 = 1000.0;
const MAX_LOOKAHEAD_MS: f32 = 20.0;

/// Ratios at or above this hard-ceiling the output at the threshold
pub const BRICKWALL_RATIO: f32 = 20.0;

// ============================================================================
// Limiter Parameters
// ============================================================================

/// Limiter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterParams {
    /// Threshold (ceiling) in dBFS
    pub threshold_db: f32,
    /// Reduction ratio above the threshold
    pub ratio: f32,
    /// Attack time in milliseconds
    pub attack_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
    /// Look-ahead window in milliseconds (0 = none)
    pub lookahead_ms: f32,
}

impl LimiterParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("threshold_db", self.threshold_db, MIN_THRESHOLD_DB, MAX_THRESHOLD_DB),
            ("ratio", self.ratio, MIN_RATIO, MAX_RATIO),
            ("attack_ms", self.attack_ms, MIN_TIME_MS, MAX_ATTACK_MS),
            ("release_ms", self.release_ms, MIN_TIME_MS, MAX_RELEASE_MS),
            ("lookahead_ms", self.lookahead_ms, 0.0, MAX_LOOKAHEAD_MS),
        ];

        for (param, value, min, max) in checks {
            if !value.is_finite() || value < min || value > max {
                return Err(PreviewError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: format!("{} to {}", min, max),
                });
            }
        }

        Ok(())
    }

    /// Whether this limiter acts as a brickwall
    pub fn is_brickwall(&self) -> bool {
        self.ratio >= BRICKWALL_RATIO
    }
}

// ============================================================================
// Limiter Effect
// ============================================================================

/// Look-ahead peak limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    params: LimiterParams,
    ceiling_linear: f32,
    attack_coeff: f32,
    release_coeff: f32,
    lookahead_samples: usize,
    /// Gain reduction in dB (>= 0)
    envelope: f32,
}

impl Limiter {
    /// Create a limiter with validated parameters
    pub fn new(params: LimiterParams) -> Result<Self> {
        params.validate()?;
        let mut limiter = Self {
            params,
            ceiling_linear: db_to_linear(params.threshold_db),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            lookahead_samples: 0,
            envelope: 0.0,
        };
        limiter.update_coefficients(48000);
        Ok(limiter)
    }

    /// Get the current parameters
    pub fn params(&self) -> &LimiterParams {
        &self.params
    }

    fn update_coefficients(&mut self, sample_rate: u32) {
        let sr = sample_rate as f32;
        self.attack_coeff = time_to_coeff(self.params.attack_ms, sr);
        self.release_coeff = time_to_coeff(self.params.release_ms, sr);
        self.lookahead_samples = (self.params.lookahead_ms * sr / 1000.0).round() as usize;
    }

    /// Required gain reduction in dB for a detected peak
    fn target_reduction_db(&self, peak: f32) -> f32 {
        let over = linear_to_db(peak) - self.params.threshold_db;
        if over > 0.0 {
            over * (1.0 - 1.0 / self.params.ratio)
        } else {
            0.0
        }
    }
}

/// Per-frame peak across channels
fn frame_peaks(buffer: &AudioBuffer) -> Vec<f32> {
    let mut peaks = vec![0.0_f32; buffer.num_samples()];
    for ch in buffer.channels() {
        for (peak, sample) in peaks.iter_mut().zip(ch) {
            *peak = peak.max(sample.abs());
        }
    }
    peaks
}

impl Effect for Limiter {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let num_samples = buffer.num_samples();
        if num_samples == 0 {
            return Ok(());
        }

        let peaks = frame_peaks(buffer);
        let brickwall = self.params.is_brickwall();

        // Sliding maximum over [i, i + lookahead]
        let mut window: VecDeque<usize> = VecDeque::new();
        let mut next = 0;

        for i in 0..num_samples {
            let horizon = (i + self.lookahead_samples).min(num_samples - 1);
            while next <= horizon {
                while window.back().is_some_and(|&j| peaks[j] <= peaks[next]) {
                    window.pop_back();
                }
                window.push_back(next);
                next += 1;
            }
            while window.front().is_some_and(|&j| j < i) {
                window.pop_front();
            }

            let detected = window.front().map_or(0.0, |&j| peaks[j]);
            let target = self.target_reduction_db(detected);

            let coeff = if target > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target;

            let gain = db_to_linear(-self.envelope);
            for ch in 0..buffer.num_channels() {
                let sample = &mut buffer.channel_mut(ch)[i];
                *sample *= gain;
                if brickwall && sample.abs() > self.ceiling_linear {
                    *sample = sample.signum() * self.ceiling_linear;
                }
            }
        }

        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32, _num_channels: usize) {
        self.update_coefficients(sample_rate);
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "limiter"
    }
}

// ============================================================================
// Tests
// ============================================================================
