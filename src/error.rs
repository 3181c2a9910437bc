//! Error handling for the preview core
//!
//! Every error carries a stable code and, where it makes sense, recovery
//! suggestions for the caller to surface.

use thiserror::Error;

use crate::chain::TierId;

/// Result type alias for preview operations
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Main error type for preview operations
#[derive(Error, Debug)]
pub enum PreviewError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // Audio Validation Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported channel count: {channels} (only mono and stereo are supported)")]
    UnsupportedChannelCount { channels: usize },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Parameter Errors
    #[error("Invalid parameter '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Rendering Errors
    #[error("Stage {stage_index} ({stage}) failed: {reason}")]
    StageExecutionFailure {
        stage_index: usize,
        stage: String,
        reason: String,
    },

    #[error("DSP overflow: stage '{stage}' produced invalid audio (NaN/Inf)")]
    DspOverflow { stage: String },

    #[error("Render failed for tier '{tier}': {source}")]
    RenderFailure {
        tier: TierId,
        #[source]
        source: Box<PreviewError>,
    },

    #[error("All {attempted} tiers failed to render")]
    AllTiersFailed { attempted: usize },

    #[error("No rendered preview for tier '{tier}'")]
    TierUnavailable { tier: TierId },

    #[error("Render pass cancelled")]
    Cancelled,

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },

    // Playback Errors
    #[error("Playback unavailable: {reason}")]
    PlaybackUnavailable { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PreviewError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PreviewError::FileNotFound { .. } => "FILE_NOT_FOUND",
            PreviewError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            PreviewError::Wav(_) => "WAV_ERROR",
            PreviewError::InvalidAudio { .. } => "INVALID_AUDIO",
            PreviewError::UnsupportedChannelCount { .. } => "UNSUPPORTED_CHANNEL_COUNT",
            PreviewError::EmptyAudio => "EMPTY_AUDIO",
            PreviewError::InvalidParameter { .. } => "INVALID_PARAMETER",
            PreviewError::InvalidConfig { .. } => "INVALID_CONFIG",
            PreviewError::StageExecutionFailure { .. } => "STAGE_EXECUTION_FAILURE",
            PreviewError::DspOverflow { .. } => "DSP_OVERFLOW",
            PreviewError::RenderFailure { .. } => "RENDER_FAILURE",
            PreviewError::AllTiersFailed { .. } => "ALL_TIERS_FAILED",
            PreviewError::TierUnavailable { .. } => "TIER_UNAVAILABLE",
            PreviewError::Cancelled => "CANCELLED",
            PreviewError::TaskFailed { .. } => "TASK_FAILED",
            PreviewError::PlaybackUnavailable { .. } => "PLAYBACK_UNAVAILABLE",
            PreviewError::Io(_) => "IO_ERROR",
            PreviewError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// A recoverable error leaves the orchestrator usable: other tiers, a
    /// retry, or a different selection can still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PreviewError::StageExecutionFailure { .. }
                | PreviewError::DspOverflow { .. }
                | PreviewError::RenderFailure { .. }
                | PreviewError::TierUnavailable { .. }
                | PreviewError::PlaybackUnavailable { .. }
                | PreviewError::Cancelled
                | PreviewError::FileNotFound { .. }
                | PreviewError::InvalidAudio { .. }
                | PreviewError::UnsupportedFormat { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PreviewError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            PreviewError::InvalidAudio { .. } | PreviewError::Wav(_) => vec![
                "Try converting the file to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            PreviewError::UnsupportedFormat { .. } => vec![
                "Convert to 16/24/32-bit integer or 32-bit float WAV",
            ],
            PreviewError::UnsupportedChannelCount { .. } => vec![
                "Downmix the recording to stereo or mono before previewing",
            ],
            PreviewError::StageExecutionFailure { .. }
            | PreviewError::DspOverflow { .. }
            | PreviewError::RenderFailure { .. } => vec![
                "The other tiers are still available for comparison",
                "Check the genre EQ curve for extreme band gains",
            ],
            PreviewError::AllTiersFailed { .. } => vec![
                "Check the source audio for NaN or infinite samples",
                "Try a different recording or a flat genre curve",
            ],
            PreviewError::PlaybackUnavailable { .. } => vec![
                "Check that an audio output device is connected",
                "Select a tier again to retry playback",
            ],
            PreviewError::InvalidConfig { .. } => vec![
                "Remove the config file to fall back to built-in defaults",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PreviewError::FileNotFound {
            path: "test.wav".to_string(),
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(PreviewError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_render_failure_keeps_stage_source() {
        let stage_err = PreviewError::StageExecutionFailure {
            stage_index: 3,
            stage: "compressor".to_string(),
            reason: "ratio out of range".to_string(),
        };
        let err = PreviewError::RenderFailure {
            tier: TierId::Premium,
            source: Box::new(stage_err),
        };

        let message = err.to_string();
        assert!(message.contains("premium"));
        assert!(message.contains("Stage 3 (compressor)"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = PreviewError::AllTiersFailed { attempted: 3 };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(!err.is_recoverable());

        let err = PreviewError::PlaybackUnavailable {
            reason: "device lost".to_string(),
        };
        assert!(err.is_recoverable());
    }
}
