//! Core type definitions for playback state

use serde::{Deserialize, Serialize};

/// A playable track as handed over by search/library/history
///
/// Immutable from the controller's point of view: the queue stores and
/// republishes these, it never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier, unique within a queue
    pub id: String,

    pub title: String,

    pub artist: String,

    pub album: Option<String>,

    /// URI-like reference to cover art, if any
    pub artwork_ref: Option<String>,

    /// 0 when the duration is not known up front
    pub duration_secs: u64,
}

impl Track {
    /// Known duration in milliseconds, 0 when unknown
    pub fn duration_ms(&self) -> u64 {
        self.duration_secs * 1000
    }
}

/// Repeat mode state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    Off,
    All,
    One,
}

impl RepeatMode {
    /// The cycle order used by the repeat button: Off -> All -> One -> Off
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Settings related to playback (repeat, shuffle, speed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub repeat: RepeatMode,
    pub shuffle_enabled: bool,
    pub playback_speed: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            repeat: RepeatMode::Off,
            shuffle_enabled: false,
            playback_speed: 1.0,
        }
    }
}
