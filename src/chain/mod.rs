//! Tier Chains
//!
//! Tier identifiers, stage descriptors, the per-tier chain builder and the
//! offline graph executor that renders a chain over a buffer.

pub mod builder;
pub mod executor;
pub mod stage;
pub mod tier;

pub use builder::{ChainSpecBuilder, GenreEqCurve};
pub use executor::GraphExecutor;
pub use stage::{ChainSpec, StageDescriptor};
pub use tier::TierId;
