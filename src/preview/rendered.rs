//! Rendered preview results

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{LoudnessStats, NormalizationReport, SegmentSelection};
use crate::chain::TierId;
use crate::engine::AudioBuffer;

/// One tier's output for the current excerpt
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPreview {
    pub tier: TierId,
    /// Level-matched output; absent when the tier failed
    #[serde(skip)]
    pub buffer: Option<Arc<AudioBuffer>>,
    /// Measured on the chain output, before level matching
    pub chain_stats: Option<LoudnessStats>,
    /// Measured on `buffer`, after level matching
    pub normalized_stats: Option<LoudnessStats>,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl RenderedPreview {
    pub(crate) fn success(
        tier: TierId,
        buffer: Arc<AudioBuffer>,
        chain_stats: LoudnessStats,
        normalized_stats: LoudnessStats,
    ) -> Self {
        Self {
            tier,
            buffer: Some(buffer),
            chain_stats: Some(chain_stats),
            normalized_stats: Some(normalized_stats),
            succeeded: true,
            error: None,
        }
    }

    pub(crate) fn failure(tier: TierId, reason: String) -> Self {
        Self {
            tier,
            buffer: None,
            chain_stats: None,
            normalized_stats: None,
            succeeded: false,
            error: Some(reason),
        }
    }
}

/// Every tier rendered from one source
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSet {
    pub pass_id: Uuid,
    pub source_fingerprint: String,
    pub selection: SegmentSelection,
    /// The unprocessed excerpt
    pub reference_stats: LoudnessStats,
    pub previews: BTreeMap<TierId, RenderedPreview>,
    pub normalization: Option<NormalizationReport>,
    pub rendered_at: DateTime<Utc>,
}

impl PreviewSet {
    /// Preview for one tier
    pub fn get(&self, tier: TierId) -> Option<&RenderedPreview> {
        self.previews.get(&tier)
    }

    /// Tiers that rendered successfully, lowest first
    pub fn succeeded(&self) -> Vec<TierId> {
        self.previews
            .values()
            .filter(|p| p.succeeded)
            .map(|p| p.tier)
            .collect()
    }

    /// Tiers that failed, lowest first
    pub fn failed(&self) -> Vec<TierId> {
        self.previews
            .values()
            .filter(|p| !p.succeeded)
            .map(|p| p.tier)
            .collect()
    }

    /// Successful buffers keyed by tier
    pub fn buffers(&self) -> BTreeMap<TierId, Arc<AudioBuffer>> {
        self.previews
            .iter()
            .filter_map(|(tier, p)| p.buffer.as_ref().map(|b| (*tier, Arc::clone(b))))
            .collect()
    }
}
