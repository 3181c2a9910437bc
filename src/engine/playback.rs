//! Tier playback state machine
//!
//! Plays one rendered tier at a time through a `PlaybackSink` and
//! crossfades linearly when the listener switches tiers. Time is driven
//! externally through `advance`, so the controller works the same against
//! a real output device and in tests.
//!
//! ```text
//! Stopped --select(t)--> Playing(t) --select(u)--> CrossfadingTo{t, u}
//!    ^                       |                            |
//!    +--select(t) / end -----+              crossfade done v
//!                                                    Playing(u)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::chain::TierId;
use crate::engine::AudioBuffer;
use crate::error::{PreviewError, Result};

// ============================================================================
// Constants
// ============================================================================

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// Sink
// ============================================================================

/// Audio output device abstraction
///
/// A sink owns at most one active source per tier.
pub trait PlaybackSink: Send {
    /// Start playing `buffer` from `offset_secs` at `gain`
    fn start(&mut self, tier: TierId, buffer: Arc<AudioBuffer>, offset_secs: f64, gain: f32)
        -> Result<()>;

    /// Change the gain of an active source
    fn set_gain(&mut self, tier: TierId, gain: f32) -> Result<()>;

    /// Stop and drop the source for `tier`, if any
    fn release(&mut self, tier: TierId);
}

/// Sink that accepts everything and produces no sound
#[derive(Debug, Default)]
pub struct NullSink;

impl PlaybackSink for NullSink {
    fn start(&mut self, _: TierId, _: Arc<AudioBuffer>, _: f64, _: f32) -> Result<()> {
        Ok(())
    }

    fn set_gain(&mut self, _: TierId, _: f32) -> Result<()> {
        Ok(())
    }

    fn release(&mut self, _: TierId) {}
}

// ============================================================================
// States and Events
// ============================================================================

/// Transport notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Started { tier: TierId },
    Crossfading { from: TierId, to: TierId },
    Stopped,
    Ended,
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing(TierId),
    CrossfadingTo {
        from: TierId,
        to: TierId,
        progress_secs: f64,
    },
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing(tier) => write!(f, "Playing({})", tier),
            PlaybackState::CrossfadingTo { from, to, .. } => {
                write!(f, "CrossfadingTo({} -> {})", from, to)
            }
        }
    }
}

/// Snapshot of the session for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub active_tier: Option<TierId>,
    pub crossfade_target: Option<TierId>,
    pub elapsed_secs: f64,
}

/// Linear crossfade gains `(outgoing, incoming)` at `t` seconds into a fade
/// of `duration` seconds. The two always sum to 1.
pub fn crossfade_gains(t: f64, duration: f64) -> (f32, f32) {
    if duration <= 0.0 {
        return (0.0, 1.0);
    }
    let incoming = (t / duration).clamp(0.0, 1.0) as f32;
    (1.0 - incoming, incoming)
}

// ============================================================================
// Playback Controller
// ============================================================================

/// Drives the sink for one set of rendered tiers
pub struct PlaybackController {
    sink: Box<dyn PlaybackSink>,
    events: broadcast::Sender<PlaybackEvent>,
    sources: BTreeMap<TierId, Arc<AudioBuffer>>,
    state: PlaybackState,
    elapsed_secs: f64,
    crossfade_secs: f64,
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("tiers", &self.sources.keys().collect::<Vec<_>>())
            .field("state", &self.state)
            .field("elapsed_secs", &self.elapsed_secs)
            .field("crossfade_secs", &self.crossfade_secs)
            .finish()
    }
}

impl PlaybackController {
    /// Create a controller playing through `sink`
    pub fn new(sink: Box<dyn PlaybackSink>, crossfade_secs: f64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sink,
            events,
            sources: BTreeMap::new(),
            state: PlaybackState::Stopped,
            elapsed_secs: 0.0,
            crossfade_secs: crossfade_secs.max(0.0),
        }
    }

    /// Receive transport notifications
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Playback position shared by all tiers
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Display snapshot
    pub fn session(&self) -> PlaybackSession {
        let (active_tier, crossfade_target) = match self.state {
            PlaybackState::Stopped => (None, None),
            PlaybackState::Playing(tier) => (Some(tier), None),
            PlaybackState::CrossfadingTo { from, to, .. } => (Some(from), Some(to)),
        };
        PlaybackSession {
            active_tier,
            crossfade_target,
            elapsed_secs: self.elapsed_secs,
        }
    }

    /// Gain of every active source
    pub fn current_gains(&self) -> BTreeMap<TierId, f32> {
        match self.state {
            PlaybackState::Stopped => BTreeMap::new(),
            PlaybackState::Playing(tier) => BTreeMap::from([(tier, 1.0)]),
            PlaybackState::CrossfadingTo {
                from,
                to,
                progress_secs,
            } => {
                let (out_gain, in_gain) = crossfade_gains(progress_secs, self.crossfade_secs);
                BTreeMap::from([(from, out_gain), (to, in_gain)])
            }
        }
    }

    /// Tiers that can be selected
    pub fn tiers(&self) -> Vec<TierId> {
        self.sources.keys().copied().collect()
    }

    /// Replace the playable tiers, stopping playback and rewinding
    pub fn load(&mut self, sources: BTreeMap<TierId, Arc<AudioBuffer>>) {
        self.release_active();
        self.state = PlaybackState::Stopped;
        self.elapsed_secs = 0.0;
        self.sources = sources;
        debug!(tiers = self.sources.len(), "Playback sources loaded");
    }

    /// Drop every source and stop
    pub fn unload(&mut self) {
        self.release_active();
        self.state = PlaybackState::Stopped;
        self.elapsed_secs = 0.0;
        self.sources.clear();
    }

    /// Listener picked a tier
    ///
    /// Picking the tier that is playing stops it; picking another tier
    /// crossfades to it from the current position.
    ///
    /// # Errors
    /// `TierUnavailable` if the tier has no rendered buffer, and
    /// `PlaybackUnavailable` if the sink fails (playback is then stopped).
    pub fn select(&mut self, tier: TierId) -> Result<()> {
        let buffer = self
            .sources
            .get(&tier)
            .cloned()
            .ok_or(PreviewError::TierUnavailable { tier })?;

        if let PlaybackState::CrossfadingTo { .. } = self.state {
            self.finish_crossfade()?;
        }

        match self.state {
            PlaybackState::Stopped => {
                if let Err(e) = self.sink.start(tier, buffer, self.elapsed_secs, 1.0) {
                    return Err(self.fail(e));
                }
                self.state = PlaybackState::Playing(tier);
                info!(%tier, at = self.elapsed_secs, "Playback started");
                self.emit(PlaybackEvent::Started { tier });
            }
            PlaybackState::Playing(current) if current == tier => {
                self.stop();
            }
            PlaybackState::Playing(current) => {
                if let Err(e) = self.sink.start(tier, buffer, self.elapsed_secs, 0.0) {
                    return Err(self.fail(e));
                }
                self.state = PlaybackState::CrossfadingTo {
                    from: current,
                    to: tier,
                    progress_secs: 0.0,
                };
                debug!(from = %current, to = %tier, "Crossfade started");
                self.emit(PlaybackEvent::Crossfading {
                    from: current,
                    to: tier,
                });
                if self.crossfade_secs <= 0.0 {
                    self.finish_crossfade()?;
                }
            }
            PlaybackState::CrossfadingTo { .. } => {}
        }

        Ok(())
    }

    /// Stop playback, keeping the position for resume
    ///
    /// The next `select` starts its tier from the saved position.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        self.release_active();
        self.state = PlaybackState::Stopped;
        info!(at = self.elapsed_secs, "Playback stopped");
        self.emit(PlaybackEvent::Stopped);
    }

    /// Move playback time forward by `dt` seconds
    pub fn advance(&mut self, dt: f64) -> Result<()> {
        if self.state == PlaybackState::Stopped || dt <= 0.0 {
            return Ok(());
        }

        self.elapsed_secs += dt;

        if let PlaybackState::CrossfadingTo {
            from,
            to,
            progress_secs,
        } = self.state
        {
            let progress_secs = progress_secs + dt;
            if progress_secs >= self.crossfade_secs {
                self.finish_crossfade()?;
            } else {
                let (out_gain, in_gain) = crossfade_gains(progress_secs, self.crossfade_secs);
                let result = self
                    .sink
                    .set_gain(from, out_gain)
                    .and_then(|_| self.sink.set_gain(to, in_gain));
                if let Err(e) = result {
                    return Err(self.fail(e));
                }
                self.state = PlaybackState::CrossfadingTo {
                    from,
                    to,
                    progress_secs,
                };
            }
        }

        let active = match self.state {
            PlaybackState::Playing(tier) => Some(tier),
            PlaybackState::CrossfadingTo { to, .. } => Some(to),
            PlaybackState::Stopped => None,
        };
        let duration = active
            .and_then(|tier| self.sources.get(&tier))
            .map(|buffer| buffer.duration_secs());

        if let Some(duration) = duration {
            if self.elapsed_secs >= duration {
                self.release_active();
                self.state = PlaybackState::Stopped;
                self.elapsed_secs = 0.0;
                info!("Playback reached the end of the excerpt");
                self.emit(PlaybackEvent::Ended);
            }
        }

        Ok(())
    }

    fn finish_crossfade(&mut self) -> Result<()> {
        if let PlaybackState::CrossfadingTo { from, to, .. } = self.state {
            self.sink.release(from);
            if let Err(e) = self.sink.set_gain(to, 1.0) {
                return Err(self.fail(e));
            }
            self.state = PlaybackState::Playing(to);
            debug!(from = %from, to = %to, "Crossfade complete");
            self.emit(PlaybackEvent::Started { tier: to });
        }
        Ok(())
    }

    fn release_active(&mut self) {
        match self.state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing(tier) => self.sink.release(tier),
            PlaybackState::CrossfadingTo { from, to, .. } => {
                self.sink.release(from);
                self.sink.release(to);
            }
        }
    }

    /// Stop after a sink failure and hand back the error
    fn fail(&mut self, error: PreviewError) -> PreviewError {
        warn!(error = %error, "Playback failed, stopping");
        let was_active = self.state != PlaybackState::Stopped;
        self.release_active();
        self.state = PlaybackState::Stopped;
        if was_active {
            self.emit(PlaybackEvent::Stopped);
        }
        match error {
            PreviewError::PlaybackUnavailable { .. } => error,
            other => PreviewError::PlaybackUnavailable {
                reason: other.to_string(),
            },
        }
    }

    /// Send to every subscriber; no subscribers is fine
    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sources() -> BTreeMap<TierId, Arc<AudioBuffer>> {
        TierId::ALL
            .iter()
            .map(|&tier| {
                let buffer = AudioBuffer::from_mono(vec![0.1; 1000], 1000).unwrap();
                (tier, Arc::new(buffer))
            })
            .collect()
    }

    fn controller() -> PlaybackController {
        let mut controller = PlaybackController::new(Box::new(NullSink), 0.3);
        controller.load(sources());
        controller
    }

    #[test]
    fn test_crossfade_gains_sum_to_one() {
        for step in 0..=30 {
            let (out_gain, in_gain) = crossfade_gains(step as f64 * 0.01, 0.3);
            assert_relative_eq!(out_gain + in_gain, 1.0, epsilon = 1e-6);
        }
        assert_eq!(crossfade_gains(0.0, 0.3), (1.0, 0.0));
        assert_eq!(crossfade_gains(0.5, 0.3), (0.0, 1.0));
        assert_eq!(crossfade_gains(0.1, 0.0), (0.0, 1.0));
    }

    #[test]
    fn test_select_plays_and_toggle_stops() {
        let mut controller = controller();
        controller.select(TierId::Basic).unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing(TierId::Basic));

        controller.advance(0.25).unwrap();
        controller.select(TierId::Basic).unwrap();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_relative_eq!(controller.elapsed_secs(), 0.25);
    }

    #[test]
    fn test_crossfade_then_playing() {
        let mut controller = controller();
        controller.select(TierId::Basic).unwrap();
        controller.select(TierId::Premium).unwrap();
        assert!(matches!(
            controller.state(),
            PlaybackState::CrossfadingTo {
                from: TierId::Basic,
                to: TierId::Premium,
                ..
            }
        ));

        controller.advance(0.15).unwrap();
        let gains = controller.current_gains();
        assert_relative_eq!(gains[&TierId::Basic], 0.5, epsilon = 1e-6);
        assert_relative_eq!(gains[&TierId::Premium], 0.5, epsilon = 1e-6);

        controller.advance(0.2).unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing(TierId::Premium));
        assert_eq!(controller.current_gains().len(), 1);
    }

    #[test]
    fn test_end_of_buffer_rewinds() {
        let mut controller = controller();
        let mut events = controller.subscribe();
        controller.select(TierId::Advanced).unwrap();
        controller.advance(1.5).unwrap();

        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.elapsed_secs(), 0.0);
        assert_eq!(
            events.try_recv().unwrap(),
            PlaybackEvent::Started {
                tier: TierId::Advanced
            }
        );
        assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Ended);
    }

    #[test]
    fn test_unknown_tier() {
        let mut controller = PlaybackController::new(Box::new(NullSink), 0.3);
        assert!(matches!(
            controller.select(TierId::Premium),
            Err(PreviewError::TierUnavailable {
                tier: TierId::Premium
            })
        ));
    }
}
