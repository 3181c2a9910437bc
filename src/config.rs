//! Preview configuration
//!
//! Every tunable of the preview pipeline, loadable from JSON. Missing fields
//! fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::TierId;
use crate::error::{PreviewError, Result};

/// Excerpt selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Excerpt length in seconds
    pub window_secs: f64,
    /// Intro skipped when scanning
    pub lead_in_secs: f64,
    /// Distance between candidate offsets
    pub hop_secs: f64,
    /// Energy is estimated on every n-th sample
    pub stride: usize,
    /// Linear fade applied to both ends of the excerpt
    pub fade_ms: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window_secs: 15.0,
            lead_in_secs: 2.0,
            hop_secs: 1.0,
            stride: 128,
            fade_ms: 50.0,
        }
    }
}

/// Loudness meter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub block_ms: f64,
    pub hop_ms: f64,
    pub short_term_ms: f64,
    /// Absolute gate in LUFS
    pub gate_lufs: f64,
    /// Added to sample peak to approximate true peak
    pub true_peak_offset_db: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            block_ms: 400.0,
            hop_ms: 100.0,
            short_term_ms: 3000.0,
            gate_lufs: -70.0,
            true_peak_offset_db: 0.2,
        }
    }
}

/// Level matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// RMS below which a tier is left untouched
    pub silence_floor: f64,
    pub min_gain: f64,
    pub max_gain: f64,
    /// Samples above this magnitude are soft-clipped after gain
    pub soft_clip_threshold: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            silence_floor: 1e-4,
            min_gain: 0.5,
            max_gain: 2.0,
            soft_clip_threshold: 0.98,
        }
    }
}

/// Tier playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub crossfade_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            crossfade_secs: 0.3,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub segment: SegmentConfig,
    pub meter: MeterConfig,
    pub normalization: NormalizationConfig,
    pub playback: PlaybackConfig,
    /// Tier every other tier is level-matched against
    pub reference_tier: TierId,
    /// Tiers to render, in render order
    pub tiers: Vec<TierId>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            meter: MeterConfig::default(),
            normalization: NormalizationConfig::default(),
            playback: PlaybackConfig::default(),
            reference_tier: TierId::Advanced,
            tiers: TierId::ALL.to_vec(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> PreviewError {
    PreviewError::InvalidConfig {
        reason: reason.into(),
    }
}

impl PreviewConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PreviewError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting is usable
    pub fn validate(&self) -> Result<()> {
        let s = &self.segment;
        if !(s.window_secs > 0.0) {
            return Err(invalid("segment.window_secs must be positive"));
        }
        if !(s.lead_in_secs >= 0.0) {
            return Err(invalid("segment.lead_in_secs must not be negative"));
        }
        if !(s.hop_secs > 0.0) {
            return Err(invalid("segment.hop_secs must be positive"));
        }
        if s.stride == 0 {
            return Err(invalid("segment.stride must be at least 1"));
        }
        if !(s.fade_ms >= 0.0) {
            return Err(invalid("segment.fade_ms must not be negative"));
        }

        let m = &self.meter;
        if !(m.block_ms > 0.0 && m.hop_ms > 0.0 && m.short_term_ms > 0.0) {
            return Err(invalid("meter block, hop and short-term lengths must be positive"));
        }

        let n = &self.normalization;
        if !(n.silence_floor >= 0.0) {
            return Err(invalid("normalization.silence_floor must not be negative"));
        }
        if !(n.min_gain > 0.0 && n.min_gain <= n.max_gain) {
            return Err(invalid("normalization gain bounds must satisfy 0 < min_gain <= max_gain"));
        }
        if !(n.soft_clip_threshold > 0.0 && n.soft_clip_threshold < 1.0) {
            return Err(invalid("normalization.soft_clip_threshold must be in (0, 1)"));
        }

        if !(self.playback.crossfade_secs >= 0.0) {
            return Err(invalid("playback.crossfade_secs must not be negative"));
        }

        if self.tiers.is_empty() {
            return Err(invalid("at least one tier must be rendered"));
        }
        let mut seen = self.tiers.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.tiers.len() {
            return Err(invalid("tier list contains duplicates"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = PreviewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference_tier, TierId::Advanced);
        assert_eq!(config.tiers, TierId::ALL.to_vec());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PreviewConfig =
            serde_json::from_str(r#"{"segment":{"window_secs":10.0},"reference_tier":"basic"}"#)
                .unwrap();
        assert_eq!(config.segment.window_secs, 10.0);
        assert_eq!(config.segment.stride, 128);
        assert_eq!(config.reference_tier, TierId::Basic);
        assert_eq!(config.meter, MeterConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PreviewConfig::default();
        config.segment.stride = 0;
        assert!(config.validate().is_err());

        let mut config = PreviewConfig::default();
        config.normalization.min_gain = 3.0;
        assert!(config.validate().is_err());

        let mut config = PreviewConfig::default();
        config.tiers = vec![TierId::Basic, TierId::Basic];
        assert!(matches!(
            config.validate(),
            Err(PreviewError::InvalidConfig { .. })
        ));

        let mut config = PreviewConfig::default();
        config.segment.window_secs = f64::NAN;
        assert!(config.validate().is_err());
    }
}
