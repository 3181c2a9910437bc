//! Audio Analysis
//!
//! Excerpt selection, loudness metering and level matching.

pub mod loudness;
pub mod normalize;
pub mod segment;

pub use loudness::{block_loudness, LoudnessMeter, LoudnessStats};
pub use normalize::{LevelNormalizer, NormalizationReport, TierAdjustment};
pub use segment::{SegmentSelection, SegmentSelector};
