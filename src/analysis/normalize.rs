//! Level matching between tiers
//!
//! Rescales every rendered tier to the RMS of a reference tier so that
//! tiers are compared on quality rather than volume.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::TierId;
use crate::config::NormalizationConfig;
use crate::dsp::soft_clip;
use crate::engine::AudioBuffer;

/// What happened to one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TierAdjustment {
    Applied {
        gain: f64,
        /// The requested gain fell outside the allowed range
        clamped: bool,
        /// At least one sample went through the soft clipper
        soft_clipped: bool,
    },
    /// RMS below the silence floor; the buffer was left untouched
    Skipped { rms: f64 },
}

/// Outcome of one normalization pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub reference_tier: TierId,
    pub reference_rms: f64,
    pub adjustments: BTreeMap<TierId, TierAdjustment>,
}

impl NormalizationReport {
    /// Adjustment recorded for a tier
    pub fn adjustment(&self, tier: TierId) -> Option<&TierAdjustment> {
        self.adjustments.get(&tier)
    }
}

/// Matches tier levels to a reference tier
#[derive(Debug, Clone, Default)]
pub struct LevelNormalizer {
    config: NormalizationConfig,
}

impl LevelNormalizer {
    /// Create a normalizer with the given settings
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    /// Pick the reference: `preferred` if present, else the lowest tier
    pub fn reference_tier(
        buffers: &BTreeMap<TierId, AudioBuffer>,
        preferred: TierId,
    ) -> Option<TierId> {
        if buffers.contains_key(&preferred) {
            Some(preferred)
        } else {
            buffers.keys().next().copied()
        }
    }

    /// Normalize every buffer in place
    ///
    /// Returns `None` when `buffers` is empty.
    pub fn normalize(
        &self,
        buffers: &mut BTreeMap<TierId, AudioBuffer>,
        preferred: TierId,
    ) -> Option<NormalizationReport> {
        let reference_tier = Self::reference_tier(buffers, preferred)?;
        let reference_rms = buffers.get(&reference_tier)?.rms();

        let mut adjustments = BTreeMap::new();
        for (tier, buffer) in buffers.iter_mut() {
            let adjustment = self.apply(buffer, reference_rms);
            if let TierAdjustment::Skipped { rms } = adjustment {
                warn!(%tier, rms, "NormalizationSkipped: tier is below the silence floor");
            } else {
                debug!(%tier, ?adjustment, "Tier normalized");
            }
            adjustments.insert(*tier, adjustment);
        }

        Some(NormalizationReport {
            reference_tier,
            reference_rms,
            adjustments,
        })
    }

    fn apply(&self, buffer: &mut AudioBuffer, reference_rms: f64) -> TierAdjustment {
        let rms = buffer.rms();
        let floor = self.config.silence_floor;
        if rms < floor || reference_rms < floor {
            return TierAdjustment::Skipped { rms };
        }

        let requested = reference_rms / rms;
        let gain = requested.clamp(self.config.min_gain, self.config.max_gain);
        let clamped = gain != requested;
        let threshold = self.config.soft_clip_threshold;
        let mut soft_clipped = false;

        for ch in 0..buffer.num_channels() {
            for sample in buffer.channel_mut(ch).iter_mut() {
                let scaled = *sample * gain as f32;
                if scaled.abs() > threshold {
                    soft_clipped = true;
                }
                *sample = soft_clip(scaled, threshold);
            }
        }

        TierAdjustment::Applied {
            gain,
            clamped,
            soft_clipped,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant(level: f32) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![level; 4800], vec![-level; 4800]], 48000).unwrap()
    }

    fn tiers(levels: &[(TierId, f32)]) -> BTreeMap<TierId, AudioBuffer> {
        levels
            .iter()
            .map(|&(tier, level)| (tier, constant(level)))
            .collect()
    }

    #[test]
    fn test_matches_reference_rms() {
        let mut buffers = tiers(&[
            (TierId::Basic, 0.2),
            (TierId::Advanced, 0.3),
            (TierId::Premium, 0.4),
        ]);
        let report = LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .unwrap();

        assert_eq!(report.reference_tier, TierId::Advanced);
        assert_relative_eq!(report.reference_rms, 0.3, epsilon = 1e-6);
        for buffer in buffers.values() {
            assert_relative_eq!(buffer.rms(), 0.3, epsilon = 1e-5);
        }
        assert_eq!(
            report.adjustment(TierId::Advanced),
            Some(&TierAdjustment::Applied {
                gain: 1.0,
                clamped: false,
                soft_clipped: false,
            })
        );
    }

    #[test]
    fn test_falls_back_to_lowest_tier() {
        let mut buffers = tiers(&[(TierId::Basic, 0.2), (TierId::Premium, 0.25)]);
        let report = LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .unwrap();
        assert_eq!(report.reference_tier, TierId::Basic);
    }

    #[test]
    fn test_gain_is_clamped() {
        let mut buffers = tiers(&[(TierId::Basic, 0.05), (TierId::Advanced, 0.4)]);
        let report = LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .unwrap();

        match report.adjustment(TierId::Basic) {
            Some(TierAdjustment::Applied { gain, clamped, .. }) => {
                assert_eq!(*gain, 2.0);
                assert!(*clamped);
            }
            other => panic!("unexpected adjustment {:?}", other),
        }
        assert_relative_eq!(buffers[&TierId::Basic].rms(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_silent_tier_skipped() {
        let mut buffers = tiers(&[(TierId::Basic, 0.00001), (TierId::Advanced, 0.3)]);
        let report = LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .unwrap();

        assert!(matches!(
            report.adjustment(TierId::Basic),
            Some(TierAdjustment::Skipped { .. })
        ));
        assert_eq!(buffers[&TierId::Basic].channel(0)[0], 0.00001);
    }

    #[test]
    fn test_overs_are_soft_clipped() {
        // Basic needs 1.8x gain: 0.55 * 1.8 = 0.99 is above the 0.98 guard
        let mut buffers = tiers(&[(TierId::Basic, 0.55), (TierId::Advanced, 0.99)]);
        let report = LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .unwrap();

        assert!(matches!(
            report.adjustment(TierId::Basic),
            Some(TierAdjustment::Applied {
                soft_clipped: true,
                clamped: false,
                ..
            })
        ));
        let peak = buffers[&TierId::Basic].peak();
        assert!(peak > 0.98 && peak < 0.99);
    }

    #[test]
    fn test_empty_map() {
        let mut buffers = BTreeMap::new();
        assert!(LevelNormalizer::default()
            .normalize(&mut buffers, TierId::Advanced)
            .is_none());
    }
}
