//! Stereo width matrix
//!
//! Linear 2x2 matrix that scales the side component by the width factor and
//! leaves the mid component untouched:
//!
//! ```text
//! direct = (1 + w) / 2
//! cross  = (1 - w) / 2
//! L' = L * direct + R * cross
//! R' = R * direct + L * cross
//! ```
//!
//! Content with L == R passes through unchanged at every width.

use crate::dsp::effect::Effect;
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

const MIN_WIDTH: f32 = 1.0;
const MAX_WIDTH: f32 = 4.0;

/// Mid/side width stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoMatrix {
    width: f32,
    direct: f32,
    cross: f32,
}

impl StereoMatrix {
    /// Create a width stage; `width` must be at least 1.0
    pub fn new(width: f32) -> Result<Self> {
        if !width.is_finite() || !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
            return Err(PreviewError::InvalidParameter {
                param: "width".to_string(),
                value: width.to_string(),
                expected: format!("{} to {}", MIN_WIDTH, MAX_WIDTH),
            });
        }

        Ok(Self {
            width,
            direct: (1.0 + width) / 2.0,
            cross: (1.0 - width) / 2.0,
        })
    }

    /// Width factor
    pub fn width(&self) -> f32 {
        self.width
    }
}

impl Effect for StereoMatrix {
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        // Mono buffers have no side component
        let Some((left, right)) = buffer.stereo_mut() else {
            return Ok(());
        };

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (in_l, in_r) = (*l, *r);
            *l = in_l * self.direct + in_r * self.cross;
            *r = in_r * self.direct + in_l * self.cross;
        }

        Ok(())
    }

    fn prepare(&mut self, _sample_rate: u32, _num_channels: usize) {}

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "stereo_matrix"
    }
}
