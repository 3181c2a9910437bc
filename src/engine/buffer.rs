//! Audio Buffer Management
//!
//! Provides the core audio buffer type shared by every stage of the preview
//! pipeline. Samples are stored non-interleaved as 32-bit float, one vector
//! per channel, with mono and stereo as the only supported layouts.

use serde::{Deserialize, Serialize};

use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate used by generated buffers
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Maximum number of channels the core accepts
pub const MAX_CHANNELS: usize = 2;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved audio buffer
///
/// Every channel holds the same number of samples. Buffers handed between
/// components are treated as values: a stage that transforms audio works on
/// its own copy, and only fades, DSP stages and level normalization touch
/// samples in place.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with the given length and layout
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// * `UnsupportedChannelCount` - zero or more than two channels
    /// * `InvalidAudio` - channel lengths differ or the sample rate is zero
    /// * `EmptyAudio` - the channels hold no samples
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() || channels.len() > MAX_CHANNELS {
            return Err(PreviewError::UnsupportedChannelCount {
                channels: channels.len(),
            });
        }

        if sample_rate == 0 {
            return Err(PreviewError::InvalidAudio {
                reason: "sample rate must be greater than zero".to_string(),
            });
        }

        let len = channels[0].len();
        if channels.iter().any(|ch| ch.len() != len) {
            return Err(PreviewError::InvalidAudio {
                reason: "all channels must have the same length".to_string(),
            });
        }

        if len == 0 {
            return Err(PreviewError::EmptyAudio);
        }

        Ok(Self {
            samples: channels,
            sample_rate,
        })
    }

    /// Create a mono buffer from a single sample vector
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Duplicate a mono buffer into two identical channels
    pub fn to_dual_mono(&self) -> Self {
        let left = self.samples[0].clone();
        Self {
            samples: vec![left.clone(), left],
            sample_rate: self.sample_rate,
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    pub fn num_samples(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel layout of this buffer
    pub fn layout(&self) -> ChannelLayout {
        if self.samples.len() == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }

    /// Returns true for two-channel buffers
    pub fn is_stereo(&self) -> bool {
        self.samples.len() == 2
    }

    /// Returns true when the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate as f64
    }

    /// Convert a duration in seconds to a sample count at this buffer's rate
    pub fn secs_to_samples(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Read-only access to one channel
    ///
    /// # Panics
    /// Panics if `ch` is out of range.
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.samples[ch]
    }

    /// Mutable access to one channel
    ///
    /// # Panics
    /// Panics if `ch` is out of range.
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.samples[ch]
    }

    /// All channels
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.samples
    }

    /// Mutable access to the left and right channels of a stereo buffer
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        match self.samples.as_mut_slice() {
            [left, right] => Some((left.as_mut_slice(), right.as_mut_slice())),
            _ => None,
        }
    }

    /// Copy `len` samples starting at `start` into a new buffer
    ///
    /// The range is clamped to the end of the buffer.
    pub fn slice(&self, start: usize, len: usize) -> AudioBuffer {
        let start = start.min(self.num_samples());
        let end = start.saturating_add(len).min(self.num_samples());
        AudioBuffer {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in self.samples.iter_mut().flat_map(|ch| ch.iter_mut()) {
            *sample *= gain;
        }
    }

    /// Apply a linear fade-in and fade-out of `fade_samples` at each end
    ///
    /// The fade length is capped at half the buffer so the two ramps never
    /// overlap.
    pub fn apply_linear_fades(&mut self, fade_samples: usize) {
        let len = self.num_samples();
        let fade = fade_samples.min(len / 2);
        if fade == 0 {
            return;
        }

        for ch in &mut self.samples {
            for i in 0..fade {
                let gain = i as f32 / fade as f32;
                ch[i] *= gain;
                ch[len - 1 - i] *= gain;
            }
        }
    }

    /// Mean-square energy over all channels
    pub fn mean_square(&self) -> f64 {
        let total = self.num_channels() * self.num_samples();
        if total == 0 {
            return 0.0;
        }

        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();

        sum_squares / total as f64
    }

    /// RMS level over all channels (linear)
    pub fn rms(&self) -> f64 {
        self.mean_square().sqrt()
    }

    /// Maximum absolute sample value over all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Returns true when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

// ============================================================================
// Tests
// ============================================================================
