//! Saturation Effect
//!
//! Waveshaping stages used for tier colour: a harmonic exciter (pre-gain,
//! high-shelf emphasis, tanh drive), tape-style warmth (tanh drive), and a
//! soft clipper that rounds peaks into a ceiling. Each shape is blended with
//! the dry signal by independent wet and dry gains.

use serde::{Deserialize, Serialize};

use crate::dsp::effect::Effect;
use crate::dsp::eq::{BiquadFilter, FilterKind};
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const MAX_MIX: f32 = 1.0;
const MAX_DRIVE: f32 = 10.0;
const MAX_PRE_GAIN: f32 = 4.0;
const EXCITER_SHELF_Q: f32 = 0.707;

// ============================================================================
// Saturation Curve
// ============================================================================

/// Waveshaping curve of a saturator stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SaturationCurve {
    /// Pre-gain into a high shelf, then tanh drive
    Exciter {
        pre_gain: f32,
        shelf_hz: f32,
        shelf_gain_db: f32,
        drive: f32,
    },
    /// Symmetric tanh drive
    Tape { drive: f32 },
    /// Unity below the ceiling, tanh-rounded into 1.0 above it
    SoftClip { ceiling: f32 },
}

impl SaturationCurve {
    fn validate(&self) -> Result<()> {
        match *self {
            SaturationCurve::Exciter {
                pre_gain, drive, ..
            } => {
                check("pre_gain", pre_gain, 0.0, MAX_PRE_GAIN)?;
                check("drive", drive, 0.0, MAX_DRIVE)
            }
            SaturationCurve::Tape { drive } => check("drive", drive, 0.0, MAX_DRIVE),
            SaturationCurve::SoftClip { ceiling } => {
                if ceiling.is_finite() && ceiling > 0.0 && ceiling < 1.0 {
                    Ok(())
                } else {
                    Err(invalid("ceiling", ceiling, "0 < ceiling < 1"))
                }
            }
        }
    }
}

// ============================================================================
// Waveshaping Functions
// ============================================================================

/// Soft clip: linear below the ceiling, tanh knee into full scale above it
#[inline]
pub fn soft_clip(x: f32, ceiling: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= ceiling {
        return x;
    }
    let headroom = 1.0 - ceiling;
    x.signum() * (ceiling + headroom * ((magnitude - ceiling) / headroom).tanh())
}

#[inline]
fn tanh_drive(x: f32, drive: f32) -> f32 {
    (x * drive).tanh()
}

fn invalid(param: &str, value: f32, expected: &str) -> PreviewError {
    PreviewError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

fn check(param: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value > min && value <= max {
        Ok(())
    } else {
        Err(invalid(param, value, &format!("{} < {} <= {}", min, param, max)))
    }
}

// ============================================================================
// Saturator Effect
// ============================================================================

/// Waveshaping saturator with parallel wet/dry blend
#[derive(Debug, Clone)]
pub struct Saturator {
    curve: SaturationCurve,
    wet_mix: f32,
    dry_mix: f32,
    /// Emphasis filter on the exciter's wet path
    shelf: Option<BiquadFilter>,
}

impl Saturator {
    /// Create a validated saturator
    pub fn new(curve: SaturationCurve, wet_mix: f32, dry_mix: f32) -> Result<Self> {
        curve.validate()?;
        for (param, value) in [("wet_mix", wet_mix), ("dry_mix", dry_mix)] {
            if !value.is_finite() || !(0.0..=MAX_MIX).contains(&value) {
                return Err(invalid(param, value, "0.0 to 1.0"));
            }
        }

        let shelf = match curve {
            SaturationCurve::Exciter {
                shelf_hz,
                shelf_gain_db,
                ..
            } => Some(BiquadFilter::new(
                FilterKind::HighShelf,
                shelf_hz,
                EXCITER_SHELF_Q,
                shelf_gain_db,
            )?),
            _ => None,
        };

        Ok(Self {
            curve,
            wet_mix,
            dry_mix,
            shelf,
        })
    }

    /// Get the waveshaping curve
    pub fn curve(&self) -> SaturationCurve {
        self.curve
    }
}

impl Effect for Saturator {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let (wet_mix, dry_mix) = (self.wet_mix, self.dry_mix);

        match self.curve {
            SaturationCurve::Exciter {
                pre_gain, drive, ..
            } => {
                let mut wet = buffer.clone();
                wet.apply_gain(pre_gain);
                if let Some(shelf) = self.shelf.as_mut() {
                    shelf.process(&mut wet)?;
                }
                for ch in 0..buffer.num_channels() {
                    let wet_ch = wet.channel(ch);
                    for (dry, &w) in buffer.channel_mut(ch).iter_mut().zip(wet_ch) {
                        *dry = dry_mix * *dry + wet_mix * tanh_drive(w, drive);
                    }
                }
            }
            SaturationCurve::Tape { drive } => {
                for ch in 0..buffer.num_channels() {
                    for s in buffer.channel_mut(ch) {
                        *s = dry_mix * *s + wet_mix * tanh_drive(*s, drive);
                    }
                }
            }
            SaturationCurve::SoftClip { ceiling } => {
                for ch in 0..buffer.num_channels() {
                    for s in buffer.channel_mut(ch) {
                        *s = dry_mix * *s + wet_mix * soft_clip(*s, ceiling);
                    }
                }
            }
        }

        Ok(())
    }

    fn prepare(&mut self, sample_rate: u32, num_channels: usize) {
        if let Some(shelf) = self.shelf.as_mut() {
            shelf.prepare(sample_rate, num_channels);
        }
    }

    fn reset(&mut self) {
        if let Some(shelf) = self.shelf.as_mut() {
            shelf.reset();
        }
    }

    fn effect_type(&self) -> &'static str {
        "saturator"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_buffer() -> AudioBuffer {
        let samples = (0..=200).map(|i| -2.0 + i as f32 * 0.02).collect();
        AudioBuffer::from_mono(samples, 48000).unwrap()
    }

    #[test]
    fn test_soft_clip_curve() {
        assert_eq!(soft_clip(0.5, 0.944), 0.5);
        assert_eq!(soft_clip(-0.944, 0.944), -0.944);
        assert!(soft_clip(1.0, 0.944) > 0.944);
        assert!(soft_clip(5.0, 0.944) <= 1.0);
        let just_over = soft_clip(0.96, 0.944);
        assert!(just_over > 0.944 && just_over < 1.0);
        assert_relative_eq!(soft_clip(-5.0, 0.944), -soft_clip(5.0, 0.944));
    }

    #[test]
    fn test_soft_clipper_bounds_output() {
        let mut clipper = Saturator::new(SaturationCurve::SoftClip { ceiling: 0.944 }, 1.0, 0.0).unwrap();
        let mut buffer = ramp_buffer();
        clipper.prepare(48000, 1);
        clipper.process(&mut buffer).unwrap();
        assert!(buffer.peak() <= 1.0);
    }

    #[test]
    fn test_tape_blend() {
        let mut warmth = Saturator::new(SaturationCurve::Tape { drive: 1.3 }, 0.6, 0.45).unwrap();
        let mut buffer = AudioBuffer::from_mono(vec![0.5], 48000).unwrap();
        warmth.prepare(48000, 1);
        warmth.process(&mut buffer).unwrap();

        let expected = 0.45 * 0.5 + 0.6 * (0.65_f32).tanh();
        assert_relative_eq!(buffer.channel(0)[0], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_exciter_adds_high_content() {
        let curve = SaturationCurve::Exciter {
            pre_gain: 0.4,
            shelf_hz: 3500.0,
            shelf_gain_db: 5.0,
            drive: 1.8,
        };
        let mut exciter = Saturator::new(curve, 0.12, 1.0).unwrap();

        let samples: Vec<f32> = (0..4800)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 8000.0 * i as f32 / 48000.0).sin())
            .collect();
        let mut buffer = AudioBuffer::from_mono(samples, 48000).unwrap();
        let before = buffer.rms();

        exciter.prepare(48000, 1);
        exciter.process(&mut buffer).unwrap();
        assert!(buffer.rms() > before);
        assert!(buffer.is_finite());
    }

    #[test]
    fn test_validation() {
        assert!(Saturator::new(SaturationCurve::Tape { drive: 1.3 }, 1.5, 0.5).is_err());
        assert!(Saturator::new(SaturationCurve::Tape { drive: 0.0 }, 0.5, 0.5).is_err());
        assert!(Saturator::new(SaturationCurve::SoftClip { ceiling: 1.0 }, 1.0, 0.0).is_err());
    }
}
