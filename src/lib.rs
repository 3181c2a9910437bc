//! Tier Preview - Mastering Tier Comparison Core
//!
//! Lets a listener compare several mastering tiers on the same recording:
//! 1. Pick the most representative excerpt of the recording
//! 2. Render it through each tier's processing chain
//! 3. Measure loudness and dynamics of every result
//! 4. Level-match the tiers so quality is compared, not volume
//! 5. Play the tiers back with crossfaded switching
//!
//! # Architecture
//!
//! Data flows one way: source buffer -> `SegmentSelector` -> excerpt ->
//! `ChainSpecBuilder` x tiers -> `GraphExecutor` x tiers -> `LoudnessMeter`
//! -> `LevelNormalizer` -> cached `PreviewSet` -> `PlaybackController`.
//! `PreviewOrchestrator` sequences the whole pass.

pub mod analysis;
pub mod chain;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod preview;

pub use analysis::{LoudnessStats, NormalizationReport, SegmentSelection};
pub use chain::{ChainSpec, GenreEqCurve, StageDescriptor, TierId};
pub use config::PreviewConfig;
pub use engine::{AudioBuffer, PlaybackEvent, PlaybackSink, PlaybackState};
pub use error::{PreviewError, Result};
pub use preview::{PipelineState, PreviewOrchestrator, PreviewSet, RenderedPreview};
