//! Model module - playback state and data types
//!
//! This module contains the state the controller owns and the snapshot
//! types it publishes. It is organized into submodules by
//! responsibility:
//!
//! - `types`: Core type definitions (tracks, repeat mode, settings)
//! - `playback`: Playback timing state and the published snapshot
//! - `queue`: The queue store mirroring the engine's item list
//! - `cache`: Resolved stream-URL cache

mod cache;
mod playback;
mod queue;
mod types;

// Re-export all public types for convenient access
pub use types::{PlayerSettings, RepeatMode, Track};

pub use playback::{PlaybackState, PlaybackTiming};

pub use queue::{QueueSnapshot, QueueStore};
pub(crate) use queue::dedup_by_id;

pub use cache::{ResolvedStream, StreamCache};
