//! Tier Previews
//!
//! Render-pass orchestration, the single-slot result cache and the
//! rendered result types.

pub mod cache;
pub mod orchestrator;
pub mod rendered;

pub use cache::{fingerprint, PreviewCache};
pub use orchestrator::{PipelineState, PreviewOrchestrator};
pub use rendered::{PreviewSet, RenderedPreview};
