//! Single-slot preview cache
//!
//! Keyed by a SHA-256 fingerprint of the source audio, so presenting the
//! same recording again reuses the last render pass.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};
use crate::preview::rendered::PreviewSet;

/// Content fingerprint over sample rate, channel count and samples
pub fn fingerprint(buffer: &AudioBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(buffer.sample_rate().to_le_bytes());
    hasher.update((buffer.num_channels() as u32).to_le_bytes());
    for channel in buffer.channels() {
        for sample in channel {
            hasher.update(sample.to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint on the blocking pool
pub async fn fingerprint_async(buffer: Arc<AudioBuffer>) -> Result<String> {
    tokio::task::spawn_blocking(move || fingerprint(&buffer))
        .await
        .map_err(|e| PreviewError::TaskFailed {
            reason: e.to_string(),
        })
}

/// Holds the results for the most recent source only
#[derive(Debug, Default)]
pub struct PreviewCache {
    entry: Option<(String, Arc<PreviewSet>)>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached set for `key`, if it is the one held
    pub fn get(&self, key: &str) -> Option<Arc<PreviewSet>> {
        match &self.entry {
            Some((cached, set)) if cached == key => Some(Arc::clone(set)),
            _ => None,
        }
    }

    /// Replace the held entry
    pub fn store(&mut self, key: String, set: Arc<PreviewSet>) {
        debug!(key = %key, "Caching preview set");
        self.entry = Some((key, set));
    }

    /// Drop the held entry
    pub fn evict(&mut self) {
        if let Some((key, _)) = self.entry.take() {
            debug!(key = %key, "Evicted preview set");
        }
    }

    /// Key of the held entry
    pub fn key(&self) -> Option<&str> {
        self.entry.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = AudioBuffer::from_mono(vec![0.1, 0.2, 0.3], 48000).unwrap();
        let b = AudioBuffer::from_mono(vec![0.1, 0.2, 0.3], 48000).unwrap();
        let c = AudioBuffer::from_mono(vec![0.1, 0.2, 0.31], 48000).unwrap();
        let d = AudioBuffer::from_mono(vec![0.1, 0.2, 0.3], 44100).unwrap();

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
        assert_ne!(fingerprint(&a), fingerprint(&d));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_layout() {
        let mono = AudioBuffer::from_mono(vec![0.5; 4], 48000).unwrap();
        let stereo = AudioBuffer::from_channels(vec![vec![0.5; 2], vec![0.5; 2]], 48000).unwrap();
        assert_ne!(fingerprint(&mono), fingerprint(&stereo));
    }

    #[tokio::test]
    async fn test_async_fingerprint_matches() {
        let buffer = Arc::new(AudioBuffer::from_mono(vec![0.25; 64], 48000).unwrap());
        let key = fingerprint_async(Arc::clone(&buffer)).await.unwrap();
        assert_eq!(key, fingerprint(&buffer));
    }

    #[test]
    fn test_empty_cache() {
        let mut cache = PreviewCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("anything").is_none());
        cache.evict();
        assert!(cache.key().is_none());
    }
}
