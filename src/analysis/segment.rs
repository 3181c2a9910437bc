//! Excerpt selection
//!
//! Picks the most energetic fixed-length window of a full recording and
//! extracts it with short linear fades, skipping the intro.

use serde::Serialize;
use tracing::debug;

use crate::config::SegmentConfig;
use crate::engine::AudioBuffer;

/// Where the excerpt starts and how long it is, in samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentSelection {
    pub offset: usize,
    pub length: usize,
    pub sample_rate: u32,
    /// Mean-square energy of the chosen window (sub-sampled, first channel)
    pub score: f64,
    /// The source was no longer than one window, so all of it is used
    pub degraded: bool,
}

impl SegmentSelection {
    /// Start of the excerpt in seconds
    pub fn offset_secs(&self) -> f64 {
        self.offset as f64 / self.sample_rate as f64
    }

    /// Excerpt length in seconds
    pub fn length_secs(&self) -> f64 {
        self.length as f64 / self.sample_rate as f64
    }
}

/// Finds and extracts the representative excerpt
#[derive(Debug, Clone, Default)]
pub struct SegmentSelector {
    config: SegmentConfig,
}

impl SegmentSelector {
    /// Create a selector with the given settings
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Mean-square energy of every `stride`-th sample in `[offset, offset + len)`
    fn window_energy(&self, data: &[f32], offset: usize, len: usize) -> f64 {
        let stride = self.config.stride.max(1);
        let (sum, count) = data[offset..offset + len]
            .iter()
            .step_by(stride)
            .fold((0.0_f64, 0_usize), |(sum, count), &s| {
                (sum + (s as f64) * (s as f64), count + 1)
            });
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Find the start of the loudest window
    ///
    /// Returns offset 0 when the buffer is no longer than one window. Ties
    /// keep the earliest offset.
    pub fn find_best_offset(&self, buffer: &AudioBuffer) -> SegmentSelection {
        let total = buffer.num_samples();
        let window = buffer.secs_to_samples(self.config.window_secs).max(1);

        if total <= window {
            debug!(
                samples = total,
                window, "SegmentTooShort: using the whole buffer as the excerpt"
            );
            let score = if total == 0 {
                0.0
            } else {
                self.window_energy(buffer.channel(0), 0, total)
            };
            return SegmentSelection {
                offset: 0,
                length: total,
                sample_rate: buffer.sample_rate(),
                score,
                degraded: true,
            };
        }

        let data = buffer.channel(0);
        let max_offset = total - window;
        let hop = buffer.secs_to_samples(self.config.hop_secs).max(1);
        let start = buffer.secs_to_samples(self.config.lead_in_secs).min(max_offset);

        let mut best_offset = start;
        let mut best_score = f64::NEG_INFINITY;

        for offset in (start..=max_offset).step_by(hop) {
            let score = self.window_energy(data, offset, window);
            if score > best_score {
                best_score = score;
                best_offset = offset;
            }
        }

        debug!(
            offset = best_offset,
            score = best_score,
            "Selected excerpt window"
        );

        SegmentSelection {
            offset: best_offset,
            length: window,
            sample_rate: buffer.sample_rate(),
            score: best_score,
            degraded: false,
        }
    }

    /// Copy the excerpt at `offset` and apply fades
    pub fn extract(&self, buffer: &AudioBuffer, offset: usize) -> AudioBuffer {
        let window = buffer.secs_to_samples(self.config.window_secs);
        let length = window.min(buffer.num_samples().saturating_sub(offset));
        let mut excerpt = buffer.slice(offset, length);
        let fade = (self.config.fade_ms / 1000.0 * buffer.sample_rate() as f64).floor() as usize;
        excerpt.apply_linear_fades(fade);
        excerpt
    }

    /// Find the best window and extract it
    pub fn select(&self, buffer: &AudioBuffer) -> (SegmentSelection, AudioBuffer) {
        let selection = self.find_best_offset(buffer);
        let excerpt = self.extract(buffer, selection.offset);
        (selection, excerpt)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 1000;

    fn config() -> SegmentConfig {
        SegmentConfig {
            stride: 1,
            ..SegmentConfig::default()
        }
    }

    /// Quiet noise-free signal with a loud region in `[loud_start, loud_end)` seconds
    fn create_test_buffer(seconds: usize, loud_start: usize, loud_end: usize) -> AudioBuffer {
        let samples: Vec<f32> = (0..seconds * SR as usize)
            .map(|i| {
                let t = i / SR as usize;
                if t >= loud_start && t < loud_end {
                    0.8
                } else {
                    0.05
                }
            })
            .collect();
        AudioBuffer::from_mono(samples, SR).unwrap()
    }

    #[test]
    fn test_short_buffer_uses_offset_zero() {
        let buffer = create_test_buffer(10, 0, 10);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert_eq!(selection.offset, 0);
        assert_eq!(selection.length, buffer.num_samples());
        assert!(selection.degraded);
    }

    #[test]
    fn test_buffer_exactly_one_window() {
        let buffer = create_test_buffer(15, 0, 15);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert_eq!(selection.offset, 0);
        assert!(selection.degraded);
    }

    #[test]
    fn test_louder_window_selected() {
        // Loud section from 30 s to 45 s of a 60 s buffer
        let buffer = create_test_buffer(60, 30, 45);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert_eq!(selection.offset, 30 * SR as usize);
        assert!(!selection.degraded);
        assert_relative_eq!(selection.offset_secs(), 30.0);
    }

    #[test]
    fn test_never_selects_lead_in() {
        // Loudest content is inside the first two seconds
        let buffer = create_test_buffer(40, 0, 2);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert!(selection.offset >= 2 * SR as usize);
    }

    #[test]
    fn test_lead_in_clamped_for_short_tail() {
        // 16 s buffer: only one second of slack, less than the lead-in
        let buffer = create_test_buffer(16, 0, 16);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert_eq!(selection.offset, SR as usize);
    }

    #[test]
    fn test_ties_keep_earliest_offset() {
        let buffer = create_test_buffer(40, 0, 0);
        let selection = SegmentSelector::new(config()).find_best_offset(&buffer);
        assert_eq!(selection.offset, 2 * SR as usize);
    }

    #[test]
    fn test_extract_applies_fades() {
        let buffer = AudioBuffer::from_mono(vec![0.5; 20 * SR as usize], SR).unwrap();
        let selector = SegmentSelector::new(config());
        let excerpt = selector.extract(&buffer, 3 * SR as usize);

        assert_eq!(excerpt.num_samples(), 15 * SR as usize);
        let ch = excerpt.channel(0);
        assert_eq!(ch[0], 0.0);
        assert!(ch[25] < 0.5);
        assert_eq!(ch[excerpt.num_samples() / 2], 0.5);
        assert!(ch[excerpt.num_samples() - 1] < 0.05);
    }

    #[test]
    fn test_extract_near_end_is_truncated() {
        let buffer = AudioBuffer::from_mono(vec![0.5; 20 * SR as usize], SR).unwrap();
        let excerpt = SegmentSelector::new(config()).extract(&buffer, 10 * SR as usize);
        assert_eq!(excerpt.num_samples(), 10 * SR as usize);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let buffer = create_test_buffer(45, 12, 20);
        let selector = SegmentSelector::new(config());
        let (a, ea) = selector.select(&buffer);
        let (b, eb) = selector.select(&buffer);
        assert_eq!(a, b);
        assert_eq!(ea, eb);
    }
}
