//! Stage descriptors and chain specs
//!
//! A chain is data: an ordered list of tagged stage descriptors that the
//! graph executor interprets. Each descriptor builds into a validated DSP
//! effect on demand.

use serde::{Deserialize, Serialize};

use crate::dsp::{
    BiquadFilter, Compressor, CompressorParams, Effect, FilterKind, Gain, Limiter, LimiterParams,
    SaturationCurve, Saturator, StereoMatrix,
};
use crate::error::Result;

/// One processing stage of a tier chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageDescriptor {
    Filter {
        kind: FilterKind,
        frequency_hz: f32,
        q: f32,
        gain_db: f32,
    },
    Compressor {
        threshold_db: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
        knee_db: f32,
    },
    StereoMatrix {
        width: f32,
    },
    Saturator {
        curve: SaturationCurve,
        wet_mix: f32,
        dry_mix: f32,
    },
    Limiter {
        threshold_db: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
        lookahead_ms: f32,
    },
    Gain {
        gain_db: f32,
    },
}

impl StageDescriptor {
    /// Short name used in logs and error reports
    pub fn name(&self) -> &'static str {
        match self {
            StageDescriptor::Filter { .. } => "filter",
            StageDescriptor::Compressor { .. } => "compressor",
            StageDescriptor::StereoMatrix { .. } => "stereo_matrix",
            StageDescriptor::Saturator { .. } => "saturator",
            StageDescriptor::Limiter { .. } => "limiter",
            StageDescriptor::Gain { .. } => "gain",
        }
    }

    /// Build the validated effect this descriptor stands for
    pub fn build(&self) -> Result<Box<dyn Effect>> {
        let effect: Box<dyn Effect> = match *self {
            StageDescriptor::Filter {
                kind,
                frequency_hz,
                q,
                gain_db,
            } => Box::new(BiquadFilter::new(kind, frequency_hz, q, gain_db)?),
            StageDescriptor::Compressor {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                knee_db,
            } => Box::new(Compressor::new(CompressorParams {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                knee_db,
            })?),
            StageDescriptor::StereoMatrix { width } => Box::new(StereoMatrix::new(width)?),
            StageDescriptor::Saturator {
                curve,
                wet_mix,
                dry_mix,
            } => Box::new(Saturator::new(curve, wet_mix, dry_mix)?),
            StageDescriptor::Limiter {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                lookahead_ms,
            } => Box::new(Limiter::new(LimiterParams {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                lookahead_ms,
            })?),
            StageDescriptor::Gain { gain_db } => Box::new(Gain::new(gain_db)?),
        };
        Ok(effect)
    }
}

/// Ordered stage list for one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainSpec {
    stages: Vec<StageDescriptor>,
}

impl ChainSpec {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn push(&mut self, stage: StageDescriptor) {
        self.stages.push(stage);
    }

    /// Stages in execution order
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true when the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Count stages matching a predicate
    pub fn count(&self, predicate: impl Fn(&StageDescriptor) -> bool) -> usize {
        self.stages.iter().filter(|s| predicate(s)).count()
    }
}

impl From<Vec<StageDescriptor>> for ChainSpec {
    fn from(stages: Vec<StageDescriptor>) -> Self {
        Self { stages }
    }
}
