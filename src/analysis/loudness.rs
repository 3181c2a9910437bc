//! Loudness metering
//!
//! Block-based loudness with an absolute gate, plus peak and dynamics
//! statistics. No K-weighting and no relative gate: the numbers are for
//! comparing tiers against each other, not for broadcast compliance.

use serde::{Deserialize, Serialize};

use crate::config::MeterConfig;
use crate::engine::AudioBuffer;

// ============================================================================
// Constants
// ============================================================================

const EPSILON: f64 = 1e-12;

/// Loudness offset applied to every block, in LU
const BLOCK_OFFSET: f64 = -0.691;

// ============================================================================
// Helper Functions
// ============================================================================

/// Loudness of one block from its mean-square energy
pub fn block_loudness(mean_square: f64) -> f64 {
    BLOCK_OFFSET + 10.0 * (mean_square + EPSILON).log10()
}

fn amplitude_db(linear: f64) -> f64 {
    20.0 * (linear + EPSILON).log10()
}

/// Running sum of per-frame squared samples over all channels
fn frame_energy_prefix(buffer: &AudioBuffer) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(buffer.num_samples() + 1);
    prefix.push(0.0);
    let mut total = 0.0;
    for i in 0..buffer.num_samples() {
        total += buffer
            .channels()
            .iter()
            .map(|ch| (ch[i] as f64) * (ch[i] as f64))
            .sum::<f64>();
        prefix.push(total);
    }
    prefix
}

// ============================================================================
// Loudness Stats
// ============================================================================

/// Read-only measurement of one buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessStats {
    pub integrated_lufs: f64,
    pub peak_db: f64,
    /// Sample peak plus a fixed offset
    pub true_peak_db: f64,
    pub rms_db: f64,
    pub crest_factor_db: f64,
    pub dynamic_range_db: f64,
    pub max_momentary_lufs: f64,
    pub max_short_term_lufs: f64,
}

// ============================================================================
// Loudness Meter
// ============================================================================

/// Gated block loudness meter
#[derive(Debug, Clone, Default)]
pub struct LoudnessMeter {
    config: MeterConfig,
}

impl LoudnessMeter {
    /// Create a meter with the given settings
    pub fn new(config: MeterConfig) -> Self {
        Self { config }
    }

    fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
        ((ms / 1000.0 * sample_rate as f64).round() as usize).max(1)
    }

    /// Mean-square energy of every block of `block_ms`, `hop_ms` apart
    ///
    /// Only blocks that fit entirely inside the buffer are measured; a
    /// buffer shorter than one block is measured as a single block.
    fn block_mean_squares(&self, buffer: &AudioBuffer, block_ms: f64) -> Vec<f64> {
        let total = buffer.num_samples();
        let channels = buffer.num_channels();
        if total == 0 || channels == 0 {
            return Vec::new();
        }

        let prefix = frame_energy_prefix(buffer);
        let mean = |start: usize, len: usize| {
            (prefix[start + len] - prefix[start]) / (len * channels) as f64
        };

        let block = Self::ms_to_samples(block_ms, buffer.sample_rate());
        if total < block {
            return vec![mean(0, total)];
        }

        let hop = Self::ms_to_samples(self.config.hop_ms, buffer.sample_rate());
        (0..=total - block)
            .step_by(hop)
            .map(|start| mean(start, block))
            .collect()
    }

    /// Momentary loudness per block
    pub fn momentary_series(&self, buffer: &AudioBuffer) -> Vec<f64> {
        self.block_mean_squares(buffer, self.config.block_ms)
            .into_iter()
            .map(block_loudness)
            .collect()
    }

    /// Short-term loudness per block
    pub fn short_term_series(&self, buffer: &AudioBuffer) -> Vec<f64> {
        self.block_mean_squares(buffer, self.config.short_term_ms)
            .into_iter()
            .map(block_loudness)
            .collect()
    }

    /// Gated integrated loudness
    ///
    /// Blocks at or below the gate are discarded. Returns the gate value
    /// when nothing passes.
    pub fn integrated_loudness(&self, buffer: &AudioBuffer) -> f64 {
        let gate = self.config.gate_lufs;
        let (sum, count) = self
            .block_mean_squares(buffer, self.config.block_ms)
            .into_iter()
            .filter(|&ms| block_loudness(ms) > gate)
            .fold((0.0, 0_usize), |(sum, count), ms| (sum + ms, count + 1));

        if count == 0 {
            gate
        } else {
            block_loudness(sum / count as f64)
        }
    }

    /// Full statistics for one buffer
    pub fn measure(&self, buffer: &AudioBuffer) -> LoudnessStats {
        let peak = buffer.peak() as f64;
        let rms = buffer.rms();
        let peak_db = amplitude_db(peak);
        let rms_db = amplitude_db(rms);

        let max_of = |series: Vec<f64>| series.into_iter().fold(self.config.gate_lufs, f64::max);

        LoudnessStats {
            integrated_lufs: self.integrated_loudness(buffer),
            peak_db,
            true_peak_db: peak_db + self.config.true_peak_offset_db,
            rms_db,
            crest_factor_db: 20.0 * ((peak + EPSILON) / (rms + EPSILON)).log10(),
            dynamic_range_db: peak_db - rms_db,
            max_momentary_lufs: max_of(self.momentary_series(buffer)),
            max_short_term_lufs: max_of(self.short_term_series(buffer)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::db_to_linear;
    use approx::assert_abs_diff_eq;

    const SR: u32 = 48000;

    fn create_sine_buffer(frequency: f32, amplitude: f32, seconds: f32) -> AudioBuffer {
        let n = (seconds * SR as f32) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 / SR as f32).sin())
            .collect();
        AudioBuffer::from_mono(samples, SR).unwrap()
    }

    fn constant_buffer(level_db: f32, seconds: f32) -> Vec<f32> {
        vec![db_to_linear(level_db); (seconds * SR as f32) as usize]
    }

    #[test]
    fn test_block_loudness_formula() {
        assert_abs_diff_eq!(block_loudness(1.0), -0.691, epsilon = 1e-9);
        assert_abs_diff_eq!(block_loudness(0.01), -20.691, epsilon = 1e-9);
    }

    #[test]
    fn test_sine_integrated_loudness() {
        // Full-scale sine: mean square 0.5 => -3.70 LUFS
        let buffer = create_sine_buffer(1000.0, 1.0, 2.0);
        let lufs = LoudnessMeter::default().integrated_loudness(&buffer);
        assert_abs_diff_eq!(lufs, -0.691 + 10.0 * 0.5_f64.log10(), epsilon = 0.01);
    }

    #[test]
    fn test_gate_excludes_quiet_blocks() {
        let mut samples = constant_buffer(-80.0, 2.0);
        samples.extend(constant_buffer(-14.0, 2.0));
        let mixed = AudioBuffer::from_mono(samples, SR).unwrap();
        let loud_only = AudioBuffer::from_mono(constant_buffer(-14.0, 2.0), SR).unwrap();

        let meter = LoudnessMeter::default();
        let mixed_lufs = meter.integrated_loudness(&mixed);
        let loud_lufs = meter.integrated_loudness(&loud_only);

        // Blocks straddling the boundary pull the value down slightly
        assert!((mixed_lufs - loud_lufs).abs() < 0.5);
        assert!(mixed_lufs > -20.0);
    }

    #[test]
    fn test_silence_returns_gate() {
        let buffer = AudioBuffer::from_mono(vec![0.0; SR as usize], SR).unwrap();
        let meter = LoudnessMeter::default();
        assert_eq!(meter.integrated_loudness(&buffer), -70.0);
        assert_eq!(meter.measure(&buffer).max_momentary_lufs, -70.0);
    }

    #[test]
    fn test_short_buffer_is_one_block() {
        let buffer = create_sine_buffer(1000.0, 0.5, 0.1);
        let meter = LoudnessMeter::default();
        assert_eq!(meter.momentary_series(&buffer).len(), 1);
        assert_eq!(meter.short_term_series(&buffer).len(), 1);
    }

    #[test]
    fn test_series_lengths() {
        // 1 s at 400 ms blocks, 100 ms hop => starts at 0..=600 ms
        let buffer = create_sine_buffer(1000.0, 0.5, 1.0);
        assert_eq!(LoudnessMeter::default().momentary_series(&buffer).len(), 7);
    }

    #[test]
    fn test_stereo_averages_channels() {
        let left = vec![0.5_f32; SR as usize];
        let right = vec![0.0_f32; SR as usize];
        let stereo = AudioBuffer::from_channels(vec![left, right], SR).unwrap();
        let lufs = LoudnessMeter::default().integrated_loudness(&stereo);
        // Mean square over both channels is 0.125
        assert_abs_diff_eq!(lufs, block_loudness(0.125), epsilon = 1e-6);
    }

    #[test]
    fn test_peak_and_dynamics() {
        let buffer = create_sine_buffer(1000.0, 0.5, 1.0);
        let stats = LoudnessMeter::default().measure(&buffer);

        assert_abs_diff_eq!(stats.peak_db, -6.02, epsilon = 0.01);
        assert_abs_diff_eq!(stats.true_peak_db, stats.peak_db + 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.rms_db, -9.03, epsilon = 0.01);
        // Sine crest factor is 3.01 dB
        assert_abs_diff_eq!(stats.crest_factor_db, 3.01, epsilon = 0.01);
        assert_abs_diff_eq!(stats.dynamic_range_db, stats.peak_db - stats.rms_db, epsilon = 1e-9);
        assert!(stats.max_short_term_lufs <= stats.max_momentary_lufs + 0.01);
    }
}
