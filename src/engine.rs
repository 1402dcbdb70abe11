//! Media engine abstraction
//!
//! The controller never talks to a concrete audio pipeline. It drives an
//! opaque engine through this trait: transport commands are cheap,
//! non-blocking calls whose failures surface later on the event channel,
//! and status queries read whatever the engine currently believes.
//! Platform integrations (or the fake engine in tests) implement it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::RepeatMode;

/// One playable entry loaded into the engine: a track identity plus the
/// stream URL it should be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineItem {
    pub track_id: String,
    pub url: String,
}

/// Coarse engine transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Nothing loaded
    Idle,
    /// Loading or rebuffering the current item
    Buffering,
    /// Ready to render audio at the current position
    Ready,
    /// Playback ran off the end of the last item
    Ended,
}

/// Why the engine moved to a different item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    /// Previous item finished and playback rolled over
    Auto,
    /// A seek landed on a different item
    Seek,
    /// The item list itself changed under the current item
    PlaylistChanged,
    /// Repeat-one looped the same item
    Repeat,
}

/// Why the reported position jumped outside normal linear playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscontinuityReason {
    AutoTransition,
    Seek,
    SeekAdjustment,
    Skip,
    Remove,
    Internal,
}

/// Typed engine failure codes
///
/// The network-class codes are the ones that indicate a stream URL which
/// can no longer be fetched; everything else is a local decode/render
/// problem the controller cannot recover by re-resolving.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("stream returned a bad HTTP status")]
    BadHttpStatus,

    #[error("network connection failed")]
    NetworkConnectionFailed,

    #[error("network connection timed out")]
    NetworkConnectionTimeout,

    #[error("unexpected stream content type")]
    InvalidContentType,

    #[error("stream not found")]
    FileNotFound,

    #[error("malformed media container")]
    ContainerMalformed,

    #[error("decoder initialization failed")]
    DecoderInitFailed,

    #[error("audio output initialization failed")]
    AudioSinkInitFailed,

    #[error("unspecified engine failure")]
    Unspecified,
}

impl EngineError {
    /// True for failures caused by the stream transport rather than the
    /// media itself. These are the expired-URL candidates.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            EngineError::BadHttpStatus
                | EngineError::NetworkConnectionFailed
                | EngineError::NetworkConnectionTimeout
                | EngineError::InvalidContentType
                | EngineError::FileNotFound
        )
    }
}

/// Events emitted by the engine, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    IsPlayingChanged {
        is_playing: bool,
    },
    StateChanged {
        state: EngineState,
    },
    /// The engine moved to the item at `index`
    ItemTransition {
        index: usize,
        track_id: String,
        reason: TransitionReason,
    },
    RepeatModeChanged {
        mode: RepeatMode,
    },
    ShuffleChanged {
        enabled: bool,
    },
    PositionDiscontinuity {
        old_position_ms: u64,
        new_position_ms: u64,
        reason: DiscontinuityReason,
    },
    PlayerError {
        code: EngineError,
    },
}

/// Receiving half of an engine's event stream
pub type EngineEventChannel = mpsc::UnboundedReceiver<EngineEvent>;

/// The opaque media engine the controller drives
///
/// Commands are fire-and-forget: implementations must not block, and
/// command failures are reported asynchronously through the event
/// channel, never as return values. Queries reflect the engine's current
/// belief and may lag slightly behind issued commands.
pub trait MediaEngine: Send + Sync {
    // Transport commands

    /// Replace the loaded items and move to `start_index`
    fn set_items(&self, items: Vec<EngineItem>, start_index: usize);

    /// Append one item to the end of the loaded list
    fn add_item(&self, item: EngineItem);

    /// Remove the item at `index`
    fn remove_item(&self, index: usize);

    /// Move the item at `from` to `to`
    fn move_item(&self, from: usize, to: usize);

    /// Drop every loaded item
    fn clear_items(&self);

    fn prepare(&self);
    fn play(&self);
    fn pause(&self);
    fn stop(&self);

    fn seek_to_ms(&self, position_ms: u64);
    fn seek_to_item(&self, index: usize, position_ms: u64);
    fn seek_to_next(&self);
    fn seek_to_previous(&self);

    fn set_shuffle_enabled(&self, enabled: bool);
    fn set_repeat_mode(&self, mode: RepeatMode);
    fn set_playback_speed(&self, speed: f32);

    // Status queries

    fn state(&self) -> EngineState;
    fn is_playing(&self) -> bool;
    fn position_ms(&self) -> u64;
    /// 0 when the duration is not yet known
    fn duration_ms(&self) -> u64;
    fn current_index(&self) -> Option<usize>;
    fn current_track_id(&self) -> Option<String>;
    fn item_count(&self) -> usize;
    fn has_next(&self) -> bool;
    fn has_previous(&self) -> bool;

    /// Hand out a fresh receiver for the engine's event stream. Every
    /// call returns a new, independent subscription.
    fn event_channel(&self) -> EngineEventChannel;
}
