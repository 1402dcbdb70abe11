//! Queue store mirroring the engine's loaded item list
//!
//! The queue holds exactly the tracks loaded into the media engine, in
//! the same order. Any divergence between the two is a bug, so every
//! mutation here is paired by the controller with the matching engine
//! command inside one critical section.

use serde::{Deserialize, Serialize};

use super::types::Track;

/// Ordered track list plus the current position
///
/// `current_index` is -1 exactly when the queue is empty. After any
/// structural mutation the current position is re-located by track id
/// rather than by index arithmetic.
#[derive(Debug, Clone)]
pub struct QueueStore {
    tracks: Vec<Track>,
    current_index: isize,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable queue view handed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    /// -1 when the queue is empty
    pub current_index: isize,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self { tracks: Vec::new(), current_index: -1 }
    }
}

impl QueueStore {
    pub fn new() -> Self {
        Self { tracks: Vec::new(), current_index: -1 }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// -1 when the queue is empty
    pub fn current_index(&self) -> isize {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        if self.current_index < 0 {
            return None;
        }
        self.tracks.get(self.current_index as usize)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == id)
    }

    pub fn position_of_id(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Number of tracks after the current one
    pub fn remaining_after_current(&self) -> usize {
        if self.current_index < 0 {
            return 0;
        }
        self.tracks.len().saturating_sub(self.current_index as usize + 1)
    }

    /// Replace the whole queue. Duplicate ids are silently skipped,
    /// keeping the first occurrence; input order otherwise defines
    /// queue order. Resets the current position.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = dedup_by_id(tracks);
        self.current_index = -1;
    }

    /// Point the current position at `index`. Out-of-range values leave
    /// the queue pointing nowhere (-1).
    pub fn set_current(&mut self, index: usize) {
        self.current_index = if index < self.tracks.len() {
            index as isize
        } else {
            -1
        };
    }

    /// Append a track unless its id is already queued. Returns whether
    /// the track was added.
    pub fn push(&mut self, track: Track) -> bool {
        if self.contains_id(&track.id) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    /// Remove the entry at `index`, re-locating the current position by
    /// the previously-current track's id. If the current track itself
    /// was removed the index is clamped; the engine's next transition
    /// event settles the real successor.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let current_id = self.current_track().map(|t| t.id.clone());
        let removed = self.tracks.remove(index);
        self.relocate_current(current_id.as_deref());
        Some(removed)
    }

    /// Move the entry at `from` to `to`, re-locating the current
    /// position by id afterward. Returns false (no change) for equal or
    /// out-of-range indices.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.tracks.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let current_id = self.current_track().map(|t| t.id.clone());
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        self.relocate_current(current_id.as_deref());
        true
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = -1;
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks.clone(),
            current_index: self.current_index,
        }
    }

    fn relocate_current(&mut self, current_id: Option<&str>) {
        self.current_index = match current_id.and_then(|id| self.position_of_id(id)) {
            Some(index) => index as isize,
            None if self.tracks.is_empty() => -1,
            // Current track gone: clamp until the engine reports where it moved
            None => self.current_index.clamp(0, self.tracks.len() as isize - 1),
        };
    }
}

/// Order-preserving dedup on track id, keeping first occurrences
pub(crate) fn dedup_by_id(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = std::collections::HashSet::new();
    tracks
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}
