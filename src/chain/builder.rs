//! Tier chain construction
//!
//! Turns a tier, a genre EQ curve and the excerpt's channel count into the
//! ordered stage list the executor renders. Stage order:
//!
//! 1. Subsonic high-pass
//! 2. Seven-band genre EQ scaled by tier intensity (+ premium air shelf)
//! 3. Corrective peaks: de-mud, box cut, presence, de-ess (advanced+)
//! 4. Bus compressor
//! 5. Character compressor (advanced+)
//! 6. Stereo width (advanced+, stereo only)
//! 7. Exciter, analog warmth, soft clipper (premium)
//! 8. Look-ahead limiter (advanced+)
//! 9. Brickwall limiter
//! 10. Output gain (unity)

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::stage::{ChainSpec, StageDescriptor};
use crate::chain::tier::TierId;
use crate::dsp::{FilterKind, SaturationCurve};
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const SUBSONIC_HZ: f32 = 25.0;
const BUTTERWORTH_Q: f32 = 0.707;

/// Premium's extra air shelf
const AIR_BOOST_HZ: f32 = 14000.0;
const AIR_BOOST_DB: f32 = 1.5;

const SOFT_CLIP_CEILING: f32 = 0.944;

const BRICKWALL_THRESHOLD_DB: f32 = -1.5;
const LIMITER_RATIO: f32 = 20.0;
const LIMITER_ATTACK_MS: f32 = 1.0;
const BRICKWALL_RELEASE_MS: f32 = 30.0;
const LOOKAHEAD_RELEASE_MS: f32 = 50.0;
const LOOKAHEAD_MS: f32 = 5.0;

/// Genre EQ band layout: (kind, frequency, Q)
const EQ_BANDS: [(FilterKind, f32, f32); 7] = [
    (FilterKind::LowShelf, 40.0, BUTTERWORTH_Q),
    (FilterKind::Peaking, 120.0, 1.2),
    (FilterKind::Peaking, 400.0, 1.4),
    (FilterKind::Peaking, 1000.0, 1.4),
    (FilterKind::Peaking, 3200.0, 1.4),
    (FilterKind::Peaking, 8000.0, 1.4),
    (FilterKind::HighShelf, 12000.0, BUTTERWORTH_Q),
];

/// Corrective peak layout: (frequency, Q)
const CORRECTIVE_BANDS: [(f32, f32); 4] = [
    (300.0, 1.0),  // de-mud
    (500.0, 1.4),  // box cut
    (3000.0, 1.0), // presence
    (6500.0, 2.0), // de-ess
];

// ============================================================================
// Genre EQ Curve
// ============================================================================

/// Gain in dB for each of the seven genre EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenreEqCurve {
    pub sub: f32,
    pub bass: f32,
    pub low_mid: f32,
    pub mid: f32,
    pub high_mid: f32,
    pub high: f32,
    pub air: f32,
}

impl GenreEqCurve {
    /// Fallback curve used when no genre preset is supplied
    pub fn neutral() -> Self {
        Self {
            sub: 1.5,
            bass: 1.0,
            low_mid: -0.5,
            mid: 0.3,
            high_mid: 1.0,
            high: 0.8,
            air: 1.2,
        }
    }

    /// All bands at 0 dB
    pub fn flat() -> Self {
        Self {
            sub: 0.0,
            bass: 0.0,
            low_mid: 0.0,
            mid: 0.0,
            high_mid: 0.0,
            high: 0.0,
            air: 0.0,
        }
    }

    /// Load a curve from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PreviewError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Band gains in ascending frequency order
    pub fn gains(&self) -> [f32; 7] {
        [
            self.sub,
            self.bass,
            self.low_mid,
            self.mid,
            self.high_mid,
            self.high,
            self.air,
        ]
    }
}

impl Default for GenreEqCurve {
    fn default() -> Self {
        Self::neutral()
    }
}

// ============================================================================
// Tier Profiles
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CompressorSettings {
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    knee_db: f32,
}

impl CompressorSettings {
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::Compressor {
            threshold_db: self.threshold_db,
            ratio: self.ratio,
            attack_ms: self.attack_ms,
            release_ms: self.release_ms,
            knee_db: self.knee_db,
        }
    }
}

/// Everything that differs between tiers
#[derive(Debug, Clone, Copy)]
struct TierProfile {
    eq_intensity: f32,
    air_boost: bool,
    corrective_gains: Option<[f32; 4]>,
    bus: CompressorSettings,
    character: Option<CompressorSettings>,
    width: Option<f32>,
    colour: bool,
    lookahead_threshold_db: Option<f32>,
}

fn profile(tier: TierId) -> TierProfile {
    match tier {
        TierId::Basic => TierProfile {
            eq_intensity: 0.70,
            air_boost: false,
            corrective_gains: None,
            bus: CompressorSettings {
                threshold_db: -14.0,
                ratio: 1.8,
                attack_ms: 20.0,
                release_ms: 200.0,
                knee_db: 12.0,
            },
            character: None,
            width: None,
            colour: false,
            lookahead_threshold_db: None,
        },
        TierId::Advanced => TierProfile {
            eq_intensity: 1.0,
            air_boost: false,
            corrective_gains: Some([-1.5, -1.0, 1.0, -1.5]),
            bus: CompressorSettings {
                threshold_db: -16.0,
                ratio: 2.2,
                attack_ms: 12.0,
                release_ms: 150.0,
                knee_db: 8.0,
            },
            character: Some(CompressorSettings {
                threshold_db: -20.0,
                ratio: 1.5,
                attack_ms: 20.0,
                release_ms: 150.0,
                knee_db: 6.0,
            }),
            width: Some(1.14),
            colour: false,
            lookahead_threshold_db: Some(-3.0),
        },
        TierId::Premium => TierProfile {
            eq_intensity: 1.10,
            air_boost: true,
            corrective_gains: Some([-2.5, -1.5, 1.5, -2.0]),
            bus: CompressorSettings {
                threshold_db: -17.0,
                ratio: 2.5,
                attack_ms: 8.0,
                release_ms: 120.0,
                knee_db: 6.0,
            },
            character: Some(CompressorSettings {
                threshold_db: -22.0,
                ratio: 2.0,
                attack_ms: 15.0,
                release_ms: 120.0,
                knee_db: 6.0,
            }),
            width: Some(1.20),
            colour: true,
            lookahead_threshold_db: Some(-2.5),
        },
    }
}

/// Premium colour stages: exciter, analog warmth, soft clipper
fn colour_stages() -> [StageDescriptor; 3] {
    [
        StageDescriptor::Saturator {
            curve: SaturationCurve::Exciter {
                pre_gain: 0.4,
                shelf_hz: 3500.0,
                shelf_gain_db: 5.0,
                drive: 1.8,
            },
            wet_mix: 0.12,
            dry_mix: 1.0,
        },
        StageDescriptor::Saturator {
            curve: SaturationCurve::Tape { drive: 1.3 },
            wet_mix: 0.60,
            dry_mix: 0.45,
        },
        StageDescriptor::Saturator {
            curve: SaturationCurve::SoftClip {
                ceiling: SOFT_CLIP_CEILING,
            },
            wet_mix: 1.0,
            dry_mix: 0.0,
        },
    ]
}

fn limiter(threshold_db: f32, release_ms: f32, lookahead_ms: f32) -> StageDescriptor {
    StageDescriptor::Limiter {
        threshold_db,
        ratio: LIMITER_RATIO,
        attack_ms: LIMITER_ATTACK_MS,
        release_ms,
        lookahead_ms,
    }
}

// ============================================================================
// Chain Spec Builder
// ============================================================================

/// Builds tier chain specs from a genre EQ curve
#[derive(Debug, Clone, Default)]
pub struct ChainSpecBuilder {
    curve: GenreEqCurve,
}

impl ChainSpecBuilder {
    /// Create a builder for the given genre curve
    pub fn new(curve: GenreEqCurve) -> Self {
        Self { curve }
    }

    /// Genre curve in use
    pub fn curve(&self) -> &GenreEqCurve {
        &self.curve
    }

    /// Build the chain for one tier
    pub fn build(&self, tier: TierId, num_channels: usize) -> ChainSpec {
        let p = profile(tier);
        let mut spec = ChainSpec::new();

        spec.push(StageDescriptor::Filter {
            kind: FilterKind::HighPass,
            frequency_hz: SUBSONIC_HZ,
            q: BUTTERWORTH_Q,
            gain_db: 0.0,
        });

        for ((kind, frequency_hz, q), gain) in EQ_BANDS.iter().zip(self.curve.gains()) {
            spec.push(StageDescriptor::Filter {
                kind: *kind,
                frequency_hz: *frequency_hz,
                q: *q,
                gain_db: gain * p.eq_intensity,
            });
        }

        if p.air_boost {
            spec.push(StageDescriptor::Filter {
                kind: FilterKind::HighShelf,
                frequency_hz: AIR_BOOST_HZ,
                q: BUTTERWORTH_Q,
                gain_db: AIR_BOOST_DB,
            });
        }

        if let Some(gains) = p.corrective_gains {
            for ((frequency_hz, q), gain_db) in CORRECTIVE_BANDS.iter().zip(gains) {
                spec.push(StageDescriptor::Filter {
                    kind: FilterKind::Peaking,
                    frequency_hz: *frequency_hz,
                    q: *q,
                    gain_db,
                });
            }
        }

        spec.push(p.bus.descriptor());

        if let Some(character) = p.character {
            spec.push(character.descriptor());
        }

        if let Some(width) = p.width {
            if num_channels == 2 {
                spec.push(StageDescriptor::StereoMatrix { width });
            }
        }

        if p.colour {
            for stage in colour_stages() {
                spec.push(stage);
            }
        }

        if let Some(threshold_db) = p.lookahead_threshold_db {
            spec.push(limiter(threshold_db, LOOKAHEAD_RELEASE_MS, LOOKAHEAD_MS));
        }

        spec.push(limiter(BRICKWALL_THRESHOLD_DB, BRICKWALL_RELEASE_MS, 0.0));
        spec.push(StageDescriptor::Gain { gain_db: 0.0 });

        debug!(%tier, num_channels, stages = spec.len(), "Built chain spec");
        spec
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn is_compressor(s: &StageDescriptor) -> bool {
        matches!(s, StageDescriptor::Compressor { .. })
    }

    fn is_limiter(s: &StageDescriptor) -> bool {
        matches!(s, StageDescriptor::Limiter { .. })
    }

    fn is_saturator(s: &StageDescriptor) -> bool {
        matches!(s, StageDescriptor::Saturator { .. })
    }

    fn is_width(s: &StageDescriptor) -> bool {
        matches!(s, StageDescriptor::StereoMatrix { .. })
    }

    #[test_case(TierId::Basic, 2, 8, 1, 1, 0, 0 ; "basic stereo")]
    #[test_case(TierId::Advanced, 2, 12, 2, 2, 1, 0 ; "advanced stereo")]
    #[test_case(TierId::Advanced, 1, 12, 2, 2, 0, 0 ; "advanced mono")]
    #[test_case(TierId::Premium, 2, 13, 2, 2, 1, 3 ; "premium stereo")]
    fn test_stage_counts(
        tier: TierId,
        channels: usize,
        filters: usize,
        compressors: usize,
        limiters: usize,
        widths: usize,
        saturators: usize,
    ) {
        let spec = ChainSpecBuilder::default().build(tier, channels);
        assert_eq!(
            spec.count(|s| matches!(s, StageDescriptor::Filter { .. })),
            filters
        );
        assert_eq!(spec.count(is_compressor), compressors);
        assert_eq!(spec.count(is_limiter), limiters);
        assert_eq!(spec.count(is_width), widths);
        assert_eq!(spec.count(is_saturator), saturators);
    }

    #[test_case(TierId::Basic)]
    #[test_case(TierId::Advanced)]
    #[test_case(TierId::Premium)]
    fn test_chain_bookends(tier: TierId) {
        let spec = ChainSpecBuilder::default().build(tier, 2);
        let stages = spec.stages();

        assert_eq!(
            stages[0],
            StageDescriptor::Filter {
                kind: FilterKind::HighPass,
                frequency_hz: 25.0,
                q: 0.707,
                gain_db: 0.0,
            }
        );
        assert_eq!(stages[stages.len() - 1], StageDescriptor::Gain { gain_db: 0.0 });
        assert_eq!(
            stages[stages.len() - 2],
            StageDescriptor::Limiter {
                threshold_db: -1.5,
                ratio: 20.0,
                attack_ms: 1.0,
                release_ms: 30.0,
                lookahead_ms: 0.0,
            }
        );
    }

    #[test]
    fn test_eq_scaled_by_intensity() {
        let builder = ChainSpecBuilder::new(GenreEqCurve::neutral());

        let eq_gain = |tier: TierId, index: usize| match builder.build(tier, 2).stages()[index] {
            StageDescriptor::Filter { gain_db, .. } => gain_db,
            other => panic!("expected filter, got {:?}", other),
        };

        // Index 1 is the sub band (1.5 dB in the neutral curve)
        assert_relative_eq!(eq_gain(TierId::Basic, 1), 1.05, epsilon = 1e-6);
        assert_relative_eq!(eq_gain(TierId::Advanced, 1), 1.5, epsilon = 1e-6);
        assert_relative_eq!(eq_gain(TierId::Premium, 1), 1.65, epsilon = 1e-6);
    }

    #[test]
    fn test_premium_corrections_are_stronger() {
        let builder = ChainSpecBuilder::default();
        let corrective = |tier: TierId| -> Vec<f32> {
            builder
                .build(tier, 2)
                .stages()
                .iter()
                .filter_map(|s| match s {
                    StageDescriptor::Filter {
                        kind: FilterKind::Peaking,
                        frequency_hz,
                        gain_db,
                        ..
                    } if CORRECTIVE_BANDS.iter().any(|(f, _)| f == frequency_hz) => Some(*gain_db),
                    _ => None,
                })
                .collect()
        };

        let advanced = corrective(TierId::Advanced);
        let premium = corrective(TierId::Premium);
        assert_eq!(advanced.len(), 4);
        for (a, p) in advanced.iter().zip(&premium) {
            assert!(p.abs() > a.abs());
            assert_eq!(p.signum(), a.signum());
        }
    }

    #[test]
    fn test_bus_compressor_tightens_with_tier() {
        let builder = ChainSpecBuilder::default();
        let bus = |tier: TierId| {
            builder
                .build(tier, 2)
                .stages()
                .iter()
                .find_map(|s| match *s {
                    StageDescriptor::Compressor {
                        threshold_db,
                        ratio,
                        attack_ms,
                        ..
                    } => Some((threshold_db, ratio, attack_ms)),
                    _ => None,
                })
                .unwrap()
        };

        let (basic, advanced, premium) = (
            bus(TierId::Basic),
            bus(TierId::Advanced),
            bus(TierId::Premium),
        );
        assert!(basic.0 > advanced.0 && advanced.0 > premium.0);
        assert!(basic.1 < advanced.1 && advanced.1 < premium.1);
        assert!(basic.2 > advanced.2 && advanced.2 > premium.2);
    }

    #[test]
    fn test_premium_colour_order() {
        let spec = ChainSpecBuilder::default().build(TierId::Premium, 2);
        let shapes: Vec<&'static str> = spec
            .stages()
            .iter()
            .filter_map(|s| match s {
                StageDescriptor::Saturator { curve, .. } => Some(match curve {
                    SaturationCurve::Exciter { .. } => "exciter",
                    SaturationCurve::Tape { .. } => "tape",
                    SaturationCurve::SoftClip { .. } => "soft_clip",
                }),
                _ => None,
            })
            .collect();
        assert_eq!(shapes, vec!["exciter", "tape", "soft_clip"]);
    }

    #[test]
    fn test_every_default_stage_builds() {
        let builder = ChainSpecBuilder::default();
        for tier in TierId::ALL {
            for stage in builder.build(tier, 2).stages() {
                assert!(stage.build().is_ok(), "{:?} failed to build", stage);
            }
        }
    }

    #[test]
    fn test_curve_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rock.json");
        std::fs::write(
            &path,
            r#"{"sub":2.0,"bass":1.5,"low_mid":-1.0,"mid":0.0,"high_mid":1.5,"high":1.0,"air":0.5}"#,
        )
        .unwrap();

        let curve = GenreEqCurve::from_file(&path).unwrap();
        assert_eq!(curve.gains(), [2.0, 1.5, -1.0, 0.0, 1.5, 1.0, 0.5]);
    }
}
