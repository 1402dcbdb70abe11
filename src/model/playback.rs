//! Playback timing and the published state snapshot

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::types::{PlayerSettings, RepeatMode, Track};
use crate::error::PlaybackErrorInfo;

/// Internal timing state for smooth progress reporting
///
/// Holds the most recent engine position sample plus the instant it was
/// taken, so readers can interpolate between samples while playing.
/// A short grace window after a user seek keeps stale engine samples
/// from overwriting the optimistic position.
#[derive(Debug, Clone)]
pub struct PlaybackTiming {
    position_ms: u64,
    duration_ms: u64,
    pub is_playing: bool,
    pub is_buffering: bool,
    last_update: Instant,
    seek_grace_until: Option<Instant>,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            is_buffering: false,
            last_update: Instant::now(),
            seek_grace_until: None,
        }
    }
}

impl PlaybackTiming {
    /// Current position, interpolated from the last sample while playing
    pub fn current_position_ms(&self) -> u64 {
        if self.is_playing && self.duration_ms > 0 {
            let elapsed = self.last_update.elapsed().as_millis() as u64;
            self.position_ms.saturating_add(elapsed).min(self.duration_ms)
        } else if self.duration_ms > 0 {
            self.position_ms.min(self.duration_ms)
        } else {
            self.position_ms
        }
    }

    /// Cached duration, 0 when unknown
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Fraction played, clamped to [0, 1]; 0 while the duration is unknown
    pub fn progress_fraction(&self) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.current_position_ms() as f32 / self.duration_ms as f32).clamp(0.0, 1.0)
    }

    /// True while ticker samples must not overwrite a user seek
    pub fn in_seek_grace(&self) -> bool {
        self.seek_grace_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Record an engine position/duration sample. Ignored inside the
    /// seek grace window.
    pub(crate) fn sample(&mut self, position_ms: u64, duration_ms: u64) {
        if self.in_seek_grace() {
            return;
        }
        self.position_ms = position_ms;
        if duration_ms > 0 {
            self.duration_ms = duration_ms;
        }
        self.last_update = Instant::now();
    }

    /// Optimistically apply a user seek and open the grace window
    pub(crate) fn apply_seek(&mut self, position_ms: u64, grace: Duration) {
        self.position_ms = if self.duration_ms > 0 {
            position_ms.min(self.duration_ms)
        } else {
            position_ms
        };
        self.last_update = Instant::now();
        self.seek_grace_until = Some(Instant::now() + grace);
    }

    /// Fold the interpolated position in before flipping the playing flag,
    /// so a pause does not rewind the progress bar to the last raw sample.
    pub(crate) fn set_playing(&mut self, is_playing: bool) {
        self.position_ms = self.current_position_ms();
        self.is_playing = is_playing;
        self.last_update = Instant::now();
    }

    /// Reset for a newly loaded track
    pub(crate) fn reset_for_track(&mut self, duration_ms: u64) {
        self.position_ms = 0;
        self.duration_ms = duration_ms;
        self.last_update = Instant::now();
        self.seek_grace_until = None;
    }
}

/// Complete playback information published to subscribers
///
/// Subscribers receive owned snapshots; mutating one has no effect on
/// the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// Fraction played, 0..=1
    pub progress: f32,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub playback_speed: f32,
    /// True while a queue refill request is outstanding
    pub is_loading_more: bool,
    pub last_error: Option<PlaybackErrorInfo>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        let settings = PlayerSettings::default();
        Self {
            current_track: None,
            is_playing: false,
            is_buffering: false,
            position_ms: 0,
            duration_ms: 0,
            progress: 0.0,
            repeat_mode: settings.repeat,
            shuffle_enabled: settings.shuffle_enabled,
            playback_speed: settings.playback_speed,
            is_loading_more: false,
            last_error: None,
        }
    }
}
