//! Preview orchestrator
//!
//! Sequences one render pass and owns the cache and playback:
//!
//! ```text
//! Idle -> SelectingSegment -> RenderingTier(0..n) -> MeasuringLoudness
//!      -> Normalizing -> Ready
//!                     \-> Failed (no tier rendered)
//! ```
//!
//! Tiers are rendered one at a time on the blocking pool. A failing tier is
//! recorded and skipped; the pass only fails when every tier fails.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::analysis::{LevelNormalizer, LoudnessMeter, SegmentSelector};
use crate::chain::{ChainSpecBuilder, GenreEqCurve, GraphExecutor, TierId};
use crate::config::PreviewConfig;
use crate::engine::{AudioBuffer, NullSink, PlaybackController, PlaybackEvent, PlaybackSink};
use crate::error::{PreviewError, Result};
use crate::preview::cache::{fingerprint_async, PreviewCache};
use crate::preview::rendered::{PreviewSet, RenderedPreview};

/// Where the render pipeline is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    SelectingSegment,
    RenderingTier { index: usize, tier: TierId },
    MeasuringLoudness,
    Normalizing,
    Ready,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::SelectingSegment => write!(f, "SelectingSegment"),
            PipelineState::RenderingTier { index, tier } => {
                write!(f, "RenderingTier({}: {})", index, tier)
            }
            PipelineState::MeasuringLoudness => write!(f, "MeasuringLoudness"),
            PipelineState::Normalizing => write!(f, "Normalizing"),
            PipelineState::Ready => write!(f, "Ready"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Runs render passes and tier playback for one listener
#[derive(Debug)]
pub struct PreviewOrchestrator {
    config: PreviewConfig,
    builder: ChainSpecBuilder,
    selector: SegmentSelector,
    meter: LoudnessMeter,
    normalizer: LevelNormalizer,
    cache: PreviewCache,
    playback: PlaybackController,
    cancel: CancellationToken,
    state: PipelineState,
}

impl PreviewOrchestrator {
    /// Create an orchestrator with no audio output
    pub fn new(config: PreviewConfig) -> Result<Self> {
        Self::with_sink(config, Box::new(NullSink))
    }

    /// Create an orchestrator that plays through `sink`
    pub fn with_sink(config: PreviewConfig, sink: Box<dyn PlaybackSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: ChainSpecBuilder::default(),
            selector: SegmentSelector::new(config.segment.clone()),
            meter: LoudnessMeter::new(config.meter.clone()),
            normalizer: LevelNormalizer::new(config.normalization.clone()),
            cache: PreviewCache::new(),
            playback: PlaybackController::new(sink, config.playback.crossfade_secs),
            cancel: CancellationToken::new(),
            state: PipelineState::Idle,
            config,
        })
    }

    /// Use a genre EQ curve instead of the neutral one
    ///
    /// Cached results were rendered with the previous curve and are dropped.
    pub fn with_genre_curve(mut self, curve: GenreEqCurve) -> Self {
        self.builder = ChainSpecBuilder::new(curve);
        self.cache.evict();
        self
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Token that cancels the next or running pass when fired from another task
    ///
    /// Each handle covers one pass: once that pass ends, however it ends,
    /// firing the handle has no effect.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Result of the last completed pass
    pub fn cached(&self) -> Option<Arc<PreviewSet>> {
        self.cache.key().and_then(|key| self.cache.get(key))
    }

    fn set_state(&mut self, state: PipelineState) {
        debug!(from = %self.state, to = %state, "Pipeline transition");
        self.state = state;
    }

    /// Render every configured tier for `source`
    ///
    /// Presenting the same audio again returns the cached set without
    /// rendering.
    ///
    /// # Errors
    /// `AllTiersFailed` when no tier renders, `Cancelled` when the pass is
    /// cancelled. Nothing is cached in either case.
    #[instrument(skip_all, fields(samples = source.num_samples(), channels = source.num_channels()))]
    pub async fn present(&mut self, source: Arc<AudioBuffer>) -> Result<Arc<PreviewSet>> {
        let key = fingerprint_async(Arc::clone(&source)).await?;
        if let Some(set) = self.cache.get(&key) {
            info!(pass_id = %set.pass_id, "Source unchanged, reusing cached previews");
            self.finish_pass(PipelineState::Ready);
            return Ok(set);
        }

        self.cache.evict();
        self.playback.unload();

        self.set_state(PipelineState::SelectingSegment);
        let (selection, excerpt) = self.selector.select(&source);
        info!(
            offset_secs = selection.offset_secs(),
            length_secs = selection.length_secs(),
            "Excerpt selected"
        );
        let excerpt = Arc::new(excerpt);

        let executor = GraphExecutor::with_cancel(self.cancel.clone());
        let tiers = self.config.tiers.clone();
        let mut outputs: BTreeMap<TierId, AudioBuffer> = BTreeMap::new();
        let mut failures: BTreeMap<TierId, String> = BTreeMap::new();

        for (index, tier) in tiers.iter().copied().enumerate() {
            self.set_state(PipelineState::RenderingTier { index, tier });
            let spec = self.builder.build(tier, excerpt.num_channels());

            match executor.render(Arc::clone(&excerpt), spec).await {
                Ok(output) => {
                    debug!(%tier, "Tier rendered");
                    outputs.insert(tier, output);
                }
                Err(PreviewError::Cancelled) => return Err(self.cancelled()),
                Err(e) => {
                    let failure = PreviewError::RenderFailure {
                        tier,
                        source: Box::new(e),
                    };
                    warn!(%tier, error = %failure, "Tier failed, continuing with the rest");
                    failures.insert(tier, failure.to_string());
                }
            }
        }

        if outputs.is_empty() {
            self.finish_pass(PipelineState::Failed);
            return Err(PreviewError::AllTiersFailed {
                attempted: tiers.len(),
            });
        }

        self.set_state(PipelineState::MeasuringLoudness);
        let reference_stats = self.meter.measure(&excerpt);
        let chain_stats: BTreeMap<TierId, _> = outputs
            .iter()
            .map(|(tier, buffer)| (*tier, self.meter.measure(buffer)))
            .collect();

        self.set_state(PipelineState::Normalizing);
        let normalization = self
            .normalizer
            .normalize(&mut outputs, self.config.reference_tier);

        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        let mut previews = BTreeMap::new();
        for (tier, buffer) in outputs {
            if let Some(before) = chain_stats.get(&tier) {
                let after = self.meter.measure(&buffer);
                previews.insert(
                    tier,
                    RenderedPreview::success(tier, Arc::new(buffer), *before, after),
                );
            }
        }
        for (tier, reason) in failures {
            previews.insert(tier, RenderedPreview::failure(tier, reason));
        }

        let set = Arc::new(PreviewSet {
            pass_id: Uuid::new_v4(),
            source_fingerprint: key.clone(),
            selection,
            reference_stats,
            previews,
            normalization,
            rendered_at: Utc::now(),
        });

        self.cache.store(key, Arc::clone(&set));
        self.playback.load(set.buffers());
        self.finish_pass(PipelineState::Ready);
        info!(
            pass_id = %set.pass_id,
            succeeded = set.succeeded().len(),
            failed = set.failed().len(),
            "Previews ready"
        );

        Ok(set)
    }

    /// End the current pass and arm a fresh token for the next one
    fn finish_pass(&mut self, state: PipelineState) {
        self.cancel = CancellationToken::new();
        self.set_state(state);
    }

    /// Abandon a cancelled pass
    fn cancelled(&mut self) -> PreviewError {
        info!("Render pass cancelled");
        self.finish_pass(PipelineState::Idle);
        PreviewError::Cancelled
    }

    /// Discard everything: cancel, clear the cache, stop playback
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cache.evict();
        self.playback.unload();
        self.finish_pass(PipelineState::Idle);
        info!("Orchestrator reset");
    }

    /// Listener picked a tier
    pub fn select_tier(&mut self, tier: TierId) -> Result<()> {
        self.playback.select(tier)
    }

    /// Stop playback, keeping the position
    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    /// Move playback time forward
    pub fn advance_playback(&mut self, dt: f64) -> Result<()> {
        self.playback.advance(dt)
    }

    /// Receive transport notifications
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.playback.subscribe()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }
}

// ============================================================================
// Tests
// ============================================================================
