//! Graph executor
//!
//! Renders a chain spec over a buffer, stage by stage, on the blocking
//! thread pool. The input buffer is never modified.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::chain::stage::ChainSpec;
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Graph Executor
// ============================================================================

/// Offline chain renderer
#[derive(Debug, Clone, Default)]
pub struct GraphExecutor {
    cancel: Option<CancellationToken>,
}

impl GraphExecutor {
    /// Create an executor with no cancellation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor that stops between stages once `cancel` fires
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// Render `spec` over `input` without blocking the async runtime
    pub async fn render(&self, input: Arc<AudioBuffer>, spec: ChainSpec) -> Result<AudioBuffer> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.render_blocking(&input, &spec))
            .await
            .map_err(|e| PreviewError::TaskFailed {
                reason: e.to_string(),
            })?
    }

    /// Render `spec` over `input` on the current thread
    ///
    /// # Errors
    /// `StageExecutionFailure` naming the first stage that fails to build,
    /// fails to process, or produces non-finite samples. `Cancelled` when
    /// the token fires between stages.
    #[instrument(skip_all, fields(stages = spec.len(), samples = input.num_samples()))]
    pub fn render_blocking(&self, input: &AudioBuffer, spec: &ChainSpec) -> Result<AudioBuffer> {
        let mut buffer = input.clone();

        for (index, descriptor) in spec.stages().iter().enumerate() {
            self.check_cancelled()?;

            let name = descriptor.name();
            let stage_failure = |reason: String| PreviewError::StageExecutionFailure {
                stage_index: index,
                stage: name.to_string(),
                reason,
            };

            let mut effect = descriptor.build().map_err(|e| stage_failure(e.to_string()))?;
            effect.prepare(buffer.sample_rate(), buffer.num_channels());
            effect
                .process(&mut buffer)
                .map_err(|e| stage_failure(e.to_string()))?;

            if !buffer.is_finite() {
                let overflow = PreviewError::DspOverflow {
                    stage: name.to_string(),
                };
                return Err(stage_failure(overflow.to_string()));
            }

            debug!(index, stage = name, "Stage rendered");
        }

        self.check_cancelled()?;
        Ok(buffer)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(PreviewError::Cancelled),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
