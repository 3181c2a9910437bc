//! DSP Stage Kernels
//!
//! Signal processing effects that a chain's stage descriptors are built
//! into. All effects implement the `Effect` trait for uniform processing.

mod compressor;
mod effect;
mod eq;
mod gain;
mod limiter;
mod saturation;
mod stereo;

pub use compressor::{Compressor, CompressorParams};
pub use effect::Effect;
pub use eq::{BiquadFilter, FilterKind};
pub use gain::Gain;
pub use limiter::{Limiter, LimiterParams, BRICKWALL_RATIO};
pub use saturation::{soft_clip, SaturationCurve, Saturator};
pub use stereo::StereoMatrix;
