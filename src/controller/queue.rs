//! Queue mutation operations
//!
//! Every mutation here mirrors into the engine inside the same critical
//! section that updates the queue store, so the two can never diverge
//! and engine events always observe a consistent queue.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::EngineItem;
use crate::error::resolution_error;
use crate::model::{dedup_by_id, Track};
use crate::resolver::StreamResolver;

use super::PlayerController;

impl PlayerController {
    /// Replace the queue with `tracks` and start playing at
    /// `start_index`.
    ///
    /// Tracks without a resolved URL (in `urls_by_track_id` or already
    /// cached) are silently dropped rather than blocking the rest - a
    /// partial resolution failure must not stop playback of the tracks
    /// that did resolve. If nothing resolves, the engine is left
    /// untouched.
    pub async fn play_queue(
        &self,
        tracks: Vec<Track>,
        urls_by_track_id: HashMap<String, String>,
        start_index: usize,
    ) {
        let Some(engine) = self.engine().await else {
            tracing::warn!("play_queue ignored: not connected");
            return;
        };
        let ordered = dedup_by_id(tracks);
        if ordered.is_empty() {
            tracing::debug!("play_queue ignored: no tracks");
            return;
        }
        let requested_id = ordered
            .get(start_index.min(ordered.len() - 1))
            .map(|t| t.id.clone());

        {
            let mut core = self.core.lock().await;
            self.cache.insert_many(&urls_by_track_id).await;

            let mut kept = Vec::with_capacity(ordered.len());
            let mut items = Vec::with_capacity(ordered.len());
            for track in ordered {
                match self.cache.get_url(&track.id).await {
                    Some(url) => {
                        items.push(EngineItem {
                            track_id: track.id.clone(),
                            url,
                        });
                        kept.push(track);
                    }
                    None => {
                        tracing::debug!(track_id = %track.id, "dropping track without a resolved stream")
                    }
                }
            }
            if items.is_empty() {
                tracing::warn!("play_queue ignored: no track resolved to a stream");
                return;
            }

            // The requested start track may have been dropped; relocate
            // by id, never by arithmetic over the original list.
            let start = requested_id
                .as_deref()
                .and_then(|id| kept.iter().position(|t| t.id == id))
                .unwrap_or(0);

            let kept_ids: Vec<&str> = kept.iter().map(|t| t.id.as_str()).collect();
            self.cache.retain_ids(&kept_ids).await;

            core.queue.replace(kept);
            core.queue.set_current(start);
            core.current_track = core.queue.current_track().cloned();
            let duration_ms = core
                .current_track
                .as_ref()
                .map(|t| t.duration_ms())
                .unwrap_or(0);
            core.timing.reset_for_track(duration_ms);
            core.timing.is_buffering = true;
            core.last_error = None;

            engine.set_items(items, start);
            engine.prepare();
            engine.play();

            self.publish_locked(&core);
            self.publish_queue_locked(&core);
            tracing::info!(count = core.queue.len(), start, "queue loaded into engine");
        }
        self.maybe_request_refill(false).await;
    }

    /// Start playing a list of tracks none of which is resolved yet.
    ///
    /// The list is rotated so the requested track comes first and the
    /// rest follow circularly. The target is published immediately (with
    /// the buffering flag set) for instant UI feedback; only its URL is
    /// resolved up front, and the remaining tracks are resolved and
    /// appended in small background batches without interrupting
    /// playback.
    pub async fn play_lazy(
        &self,
        tracks: Vec<Track>,
        start_index: usize,
        resolver: Arc<dyn StreamResolver>,
    ) {
        if self.engine().await.is_none() {
            tracing::warn!("play_lazy ignored: not connected");
            return;
        }
        let mut ordered = dedup_by_id(tracks);
        if ordered.is_empty() {
            tracing::debug!("play_lazy ignored: no tracks");
            return;
        }
        let start = start_index.min(ordered.len() - 1);
        ordered.rotate_left(start);
        let target = ordered[0].clone();

        {
            let mut core = self.core.lock().await;
            core.current_track = Some(target.clone());
            core.timing.reset_for_track(target.duration_ms());
            core.timing.is_buffering = true;
            core.last_error = None;
            self.publish_locked(&core);
        }
        tracing::info!(
            track_id = %target.id,
            title = %target.title,
            total = ordered.len(),
            "starting lazy playback"
        );

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.run_lazy_pipeline(ordered, resolver).await;
        });
        self.store_prefetch(handle).await;
    }

    async fn run_lazy_pipeline(&self, ordered: Vec<Track>, resolver: Arc<dyn StreamResolver>) {
        let target = ordered[0].clone();
        let url = match resolver.resolve(&target.id).await {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(track_id = %target.id, error = %error, "failed to resolve start track");
                self.publish_error(resolution_error(&target.title), true).await;
                return;
            }
        };
        let mut urls = HashMap::new();
        urls.insert(target.id.clone(), url);
        self.play_queue(vec![target], urls, 0).await;

        for batch in ordered[1..].chunks(self.config.lazy_batch_size) {
            if !self.is_connected().await {
                tracing::debug!("lazy prefetch stopped: disconnected");
                return;
            }
            let resolved = futures::future::join_all(batch.iter().map(|track| {
                let resolver = resolver.clone();
                async move { (track.clone(), resolver.resolve(&track.id).await) }
            }))
            .await;

            let mut batch_urls = HashMap::new();
            let mut batch_tracks = Vec::new();
            for (track, result) in resolved {
                match result {
                    Ok(url) => {
                        batch_urls.insert(track.id.clone(), url);
                        batch_tracks.push(track);
                    }
                    Err(error) => {
                        tracing::debug!(track_id = %track.id, error = %error, "dropping track that failed to resolve")
                    }
                }
            }
            if !batch_tracks.is_empty() {
                self.append(batch_tracks, batch_urls).await;
            }
            tokio::time::sleep(self.config.lazy_batch_pause).await;
        }
        tracing::debug!("lazy prefetch complete");
    }

    /// Append tracks to the end of the queue and the engine.
    ///
    /// Tracks already queued (by id) and tracks without a resolved URL
    /// are skipped.
    pub async fn append(&self, tracks: Vec<Track>, urls_by_track_id: HashMap<String, String>) {
        let Some(engine) = self.engine().await else {
            tracing::warn!("append ignored: not connected");
            return;
        };
        let incoming = dedup_by_id(tracks);
        if incoming.is_empty() {
            return;
        }
        let mut core = self.core.lock().await;
        self.cache.insert_many(&urls_by_track_id).await;

        let mut appended = 0usize;
        for track in incoming {
            if core.queue.contains_id(&track.id) {
                tracing::debug!(track_id = %track.id, "skipping append: already queued");
                continue;
            }
            let Some(url) = self.cache.get_url(&track.id).await else {
                tracing::debug!(track_id = %track.id, "skipping append: no resolved stream");
                continue;
            };
            engine.add_item(EngineItem {
                track_id: track.id.clone(),
                url,
            });
            core.queue.push(track);
            appended += 1;
        }
        if appended > 0 {
            // The continuation arrived; no need to wait for the auto-reset
            core.loading_more = false;
            self.publish_locked(&core);
            self.publish_queue_locked(&core);
            tracing::info!(appended, total = core.queue.len(), "tracks appended to queue");
        }
    }

    /// Remove the queue entry (and engine item) at `index`.
    pub async fn remove(&self, index: usize) {
        let Some(engine) = self.engine().await else {
            tracing::warn!("remove ignored: not connected");
            return;
        };
        {
            let mut core = self.core.lock().await;
            if index >= core.queue.len() {
                tracing::debug!(index, len = core.queue.len(), "remove ignored: index out of bounds");
                return;
            }
            engine.remove_item(index);
            if let Some(track) = core.queue.remove(index) {
                self.cache.remove(&track.id).await;
                tracing::info!(track_id = %track.id, "removed track from queue");
            }
            match core.queue.current_track().cloned() {
                Some(track) => core.current_track = Some(track),
                None if core.queue.is_empty() => core.current_track = None,
                // No current position yet; keep the published track
                // until the engine reports a transition
                None => {}
            }
            self.publish_locked(&core);
            self.publish_queue_locked(&core);
        }
        // Removal can drop the remaining count below the watermark
        self.maybe_request_refill(false).await;
    }

    /// Move the entry at `from` to `to` in both queue and engine.
    /// Equal or out-of-range indices are a no-op.
    pub async fn reorder(&self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let Some(engine) = self.engine().await else {
            tracing::warn!("reorder ignored: not connected");
            return;
        };
        let mut core = self.core.lock().await;
        if !core.queue.reorder(from, to) {
            tracing::debug!(from, to, "reorder ignored: invalid indices");
            return;
        }
        engine.move_item(from, to);
        if let Some(track) = core.queue.current_track().cloned() {
            core.current_track = Some(track);
        }
        self.publish_queue_locked(&core);
        tracing::debug!(from, to, "queue reordered");
    }

    /// Empty the queue, the engine item list, and the URL cache.
    pub async fn clear(&self) {
        let Some(engine) = self.engine().await else {
            tracing::warn!("clear ignored: not connected");
            return;
        };
        let mut core = self.core.lock().await;
        engine.clear_items();
        core.queue.clear();
        self.cache.clear().await;
        core.current_track = None;
        core.timing.reset_for_track(0);
        core.timing.set_playing(false);
        core.timing.is_buffering = false;
        self.publish_locked(&core);
        self.publish_queue_locked(&core);
        tracing::info!("queue cleared");
    }

    /// Store a freshly re-resolved stream URL for a track.
    ///
    /// Called by the collaborator registered with
    /// [`on_stream_url_expired`](Self::on_stream_url_expired). The URL
    /// takes effect the next time the track is loaded into the engine.
    pub async fn update_stream_url(&self, track_id: &str, url: &str) {
        self.cache.insert(track_id, url).await;
        tracing::info!(track_id = %track_id, "stream URL refreshed");
    }
}
