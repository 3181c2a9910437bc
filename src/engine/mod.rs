//! Audio Engine Module
//!
//! Core audio plumbing:
//! - Audio buffer management
//! - WAV file I/O
//! - Tier playback and crossfading

pub mod buffer;
pub mod io;
pub mod playback;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{export_wav, generate_test_tone, import_wav, ExportFormat};
pub use playback::{
    crossfade_gains, NullSink, PlaybackController, PlaybackEvent, PlaybackSession, PlaybackSink,
    PlaybackState,
};
