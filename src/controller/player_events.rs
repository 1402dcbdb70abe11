//! Engine event listener
//!
//! A spawned task drains the engine's event channel and folds each event
//! into published state. Events are processed strictly in emission
//! order, and every state mutation takes the same core lock the command
//! operations take, so an event can never observe a half-applied queue
//! mutation.

use tokio::task::JoinHandle;

use crate::engine::{DiscontinuityReason, EngineError, EngineEvent, EngineEventChannel, EngineState};
use crate::error::classify_engine_error;

use super::PlayerController;

impl PlayerController {
    pub(crate) fn spawn_event_listener(&self, mut events: EngineEventChannel) -> JoinHandle<()> {
        let controller = self.clone();
        tracing::debug!("starting engine event listener");
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_engine_event(event).await;
            }
            tracing::debug!("engine event channel closed, listener exiting");
        })
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IsPlayingChanged { is_playing } => {
                tracing::debug!(is_playing, "engine playing flag changed");
                {
                    let mut core = self.core.lock().await;
                    core.timing.set_playing(is_playing);
                    if is_playing {
                        core.timing.is_buffering = false;
                        core.last_error = None;
                    }
                    self.publish_locked(&core);
                }
                if is_playing {
                    self.start_ticker().await;
                } else {
                    self.abort_ticker().await;
                }
            }

            EngineEvent::StateChanged { state } => {
                tracing::debug!(?state, "engine state changed");
                match state {
                    EngineState::Buffering => {
                        let mut core = self.core.lock().await;
                        core.timing.is_buffering = true;
                        self.publish_locked(&core);
                    }
                    EngineState::Ready => {
                        let mut core = self.core.lock().await;
                        core.timing.is_buffering = false;
                        core.last_error = None;
                        if let Some(engine) = self.engine().await {
                            core.timing.sample(engine.position_ms(), engine.duration_ms());
                        }
                        self.publish_locked(&core);
                    }
                    EngineState::Ended => {
                        {
                            let mut core = self.core.lock().await;
                            core.timing.is_buffering = false;
                            core.timing.set_playing(false);
                            self.publish_locked(&core);
                        }
                        self.abort_ticker().await;
                        // Starvation overrides the refill cooldown
                        self.maybe_request_refill(true).await;
                    }
                    EngineState::Idle => {}
                }
            }

            EngineEvent::ItemTransition { index, track_id, reason } => {
                tracing::info!(index, track_id = %track_id, ?reason, "engine moved to new item");
                {
                    let mut core = self.core.lock().await;
                    // Trust the id over the raw index; the queue may have
                    // mutated since the engine scheduled this event.
                    let position = core.queue.position_of_id(&track_id).unwrap_or(index);
                    core.queue.set_current(position);
                    if let Some(track) = core.queue.current_track().cloned() {
                        let duration_ms = match track.duration_ms() {
                            0 => self
                                .engine()
                                .await
                                .map(|e| e.duration_ms())
                                .unwrap_or(0),
                            known => known,
                        };
                        core.timing.reset_for_track(duration_ms);
                        core.current_track = Some(track);
                    }
                    self.publish_locked(&core);
                    self.publish_queue_locked(&core);
                }
                self.maybe_request_refill(false).await;
            }

            EngineEvent::RepeatModeChanged { mode } => {
                let mut core = self.core.lock().await;
                core.settings.repeat = mode;
                self.publish_locked(&core);
            }

            EngineEvent::ShuffleChanged { enabled } => {
                let mut core = self.core.lock().await;
                core.settings.shuffle_enabled = enabled;
                self.publish_locked(&core);
            }

            EngineEvent::PositionDiscontinuity {
                old_position_ms,
                new_position_ms,
                reason,
            } => {
                tracing::debug!(old_position_ms, new_position_ms, ?reason, "position discontinuity");
                {
                    let mut core = self.core.lock().await;
                    core.timing.sample(new_position_ms, 0);
                    self.publish_locked(&core);
                }
                if matches!(
                    reason,
                    DiscontinuityReason::AutoTransition | DiscontinuityReason::SeekAdjustment
                ) {
                    self.maybe_request_refill(false).await;
                }
            }

            EngineEvent::PlayerError { code } => {
                self.handle_engine_error(code).await;
            }
        }
    }

    /// Classify an engine failure and dispatch recovery.
    ///
    /// Network-class failures mean the stream URL can no longer be
    /// fetched - retrying the same URL cannot fix an expired signed
    /// link, so the re-resolution collaborator is asked for a fresh one
    /// instead. Everything else is surfaced and left to the engine.
    async fn handle_engine_error(&self, code: EngineError) {
        let info = classify_engine_error(&code);
        let track_id = {
            let mut core = self.core.lock().await;
            core.last_error = Some(info);
            self.publish_locked(&core);
            core.current_track.as_ref().map(|t| t.id.clone())
        };
        if code.is_network() {
            match track_id {
                Some(track_id) => {
                    tracing::warn!(
                        track_id = %track_id,
                        error = %code,
                        "stream URL looks expired, requesting re-resolution"
                    );
                    self.invoke_url_expired(&track_id).await;
                }
                None => {
                    tracing::warn!(error = %code, "network playback error with no current track")
                }
            }
        } else {
            tracing::error!(error = %code, "engine reported an unrecoverable playback error");
        }
    }
}
