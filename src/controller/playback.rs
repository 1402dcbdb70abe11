//! Transport operations

use crate::engine::{EngineItem, EngineState};
use crate::model::Track;

use super::PlayerController;

impl PlayerController {
    /// Replace the queue with a single already-resolved track and start
    /// playing it. Proactively runs a refill check so a single track
    /// grows into a continuous queue.
    pub async fn play_single(&self, track: Track, stream_url: impl Into<String>) {
        let Some(engine) = self.engine().await else {
            tracing::warn!("play_single ignored: not connected");
            return;
        };
        let url = stream_url.into();
        {
            let mut core = self.core.lock().await;
            self.cache.clear().await;
            self.cache.insert(&track.id, &url).await;
            core.queue.replace(vec![track.clone()]);
            core.queue.set_current(0);
            core.current_track = Some(track.clone());
            core.timing.reset_for_track(track.duration_ms());
            core.timing.is_buffering = true;
            core.last_error = None;
            engine.set_items(
                vec![EngineItem {
                    track_id: track.id.clone(),
                    url,
                }],
                0,
            );
            engine.prepare();
            engine.play();
            self.publish_locked(&core);
            self.publish_queue_locked(&core);
        }
        tracing::info!(track_id = %track.id, title = %track.title, "playing single track");
        self.maybe_request_refill(false).await;
    }

    /// Pause when playing; otherwise play, rewinding first if the engine
    /// already ran off the end.
    pub async fn toggle_play_pause(&self) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("toggle ignored: not connected");
            return;
        };
        if engine.is_playing() {
            tracing::debug!("pausing playback");
            engine.pause();
        } else {
            if engine.state() == EngineState::Ended {
                engine.seek_to_ms(0);
            }
            tracing::debug!("resuming playback");
            engine.play();
        }
    }

    /// Advance to the next queued track. At a dead end (no next item)
    /// the refill callback is invoked directly so the UI is never stuck.
    pub async fn skip_to_next(&self) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("skip ignored: not connected");
            return;
        };
        if engine.has_next() {
            tracing::debug!("skipping to next track");
            engine.seek_to_next();
        } else {
            tracing::debug!("skip hit end of queue, requesting more tracks");
            self.request_refill_now().await;
        }
    }

    /// Restart the current track when far enough in, otherwise go back
    /// to the previous one.
    pub async fn skip_to_previous(&self) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("skip ignored: not connected");
            return;
        };
        let restart_threshold_ms = self.config.previous_restart_threshold.as_millis() as u64;
        if engine.position_ms() > restart_threshold_ms {
            tracing::debug!("restarting current track");
            engine.seek_to_ms(0);
        } else if engine.has_previous() {
            tracing::debug!("skipping to previous track");
            engine.seek_to_previous();
        } else {
            engine.seek_to_ms(0);
        }
    }

    /// Seek to a fraction of the current track.
    ///
    /// The cached duration is preferred over the engine-reported one (it
    /// is more stable across buffering transitions), the target is
    /// clamped into the track, and the published position is updated
    /// optimistically before the engine confirms so the slider does not
    /// snap back. A short grace window keeps the ticker from overwriting
    /// the optimistic value with a stale engine sample.
    pub async fn seek_to_fraction(&self, fraction: f64) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("seek ignored: not connected");
            return;
        };
        let mut core = self.core.lock().await;
        let duration_ms = match core.timing.duration_ms() {
            0 => engine.duration_ms(),
            cached => cached,
        };
        if duration_ms == 0 {
            tracing::debug!("seek ignored: duration unknown");
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let target_ms = ((duration_ms as f64) * fraction).round() as u64;
        let target_ms = target_ms.min(duration_ms);

        core.timing.apply_seek(target_ms, self.config.seek_grace);
        engine.seek_to_ms(target_ms);
        self.publish_locked(&core);
        tracing::debug!(target_ms, "seeking");
    }

    /// Cycle the repeat mode: Off -> All -> One -> Off
    pub async fn cycle_repeat_mode(&self) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("repeat change ignored: not connected");
            return;
        };
        let mut core = self.core.lock().await;
        let mode = core.settings.repeat.next();
        core.settings.repeat = mode;
        engine.set_repeat_mode(mode);
        self.publish_locked(&core);
        tracing::info!(?mode, "repeat mode changed");
    }

    pub async fn set_shuffle(&self, enabled: bool) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("shuffle change ignored: not connected");
            return;
        };
        let mut core = self.core.lock().await;
        core.settings.shuffle_enabled = enabled;
        engine.set_shuffle_enabled(enabled);
        self.publish_locked(&core);
        tracing::info!(enabled, "shuffle changed");
    }

    /// Set playback speed, clamped to the configured bounds
    pub async fn set_playback_speed(&self, speed: f32) {
        let Some(engine) = self.engine().await else {
            tracing::debug!("speed change ignored: not connected");
            return;
        };
        let speed = speed.clamp(self.config.min_playback_speed, self.config.max_playback_speed);
        let mut core = self.core.lock().await;
        core.settings.playback_speed = speed;
        engine.set_playback_speed(speed);
        self.publish_locked(&core);
        tracing::info!(speed, "playback speed changed");
    }
}
