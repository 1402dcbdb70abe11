//! Low-watermark queue refill policy
//!
//! Keeps "infinite" queues flowing: when the remaining track count falls
//! to the watermark, the registered collaborator is asked for more,
//! rate-limited by a wall-clock cooldown. Reaching the end of the queue
//! overrides the cooldown - starvation must never be masked by rate
//! limiting.

use tokio::time::Instant;

use super::{PlayerController, PlayerCore};

impl PlayerController {
    /// Automatic refill check, run from the policy's trigger points
    /// (play start, item transitions, playback ended, queue removal,
    /// seek-adjustment discontinuities).
    pub(crate) async fn maybe_request_refill(&self, playback_ended: bool) {
        if !self.is_connected().await {
            return;
        }
        let fired = {
            let mut core = self.core.lock().await;
            let remaining = core.queue.remaining_after_current();
            if !playback_ended && remaining > self.config.low_watermark {
                return;
            }
            if !playback_ended {
                if let Some(last) = core.last_refill_request {
                    let since = last.elapsed();
                    if since < self.config.refill_cooldown {
                        tracing::debug!(
                            remaining,
                            since_ms = since.as_millis() as u64,
                            "refill suppressed by cooldown"
                        );
                        return;
                    }
                }
            }
            self.mark_refill_requested(&mut core)
        };
        if let Some(track_id) = fired {
            self.arm_refill_reset().await;
            tracing::info!(track_id = %track_id, ended = playback_ended, "requesting more tracks");
            self.invoke_needs_more(&track_id).await;
        }
    }

    /// Forced check: clears the cooldown gate first, then runs the
    /// normal threshold logic.
    pub async fn force_refill_check(&self) {
        {
            let mut core = self.core.lock().await;
            core.last_refill_request = None;
        }
        self.maybe_request_refill(false).await;
    }

    /// Direct request from a dead-end skip. Distinct from the debounced
    /// automatic check: neither the watermark nor the cooldown applies,
    /// because the user is actively stuck.
    pub(crate) async fn request_refill_now(&self) {
        let fired = {
            let mut core = self.core.lock().await;
            self.mark_refill_requested(&mut core)
        };
        if let Some(track_id) = fired {
            self.arm_refill_reset().await;
            tracing::info!(track_id = %track_id, "requesting more tracks after dead-end skip");
            self.invoke_needs_more(&track_id).await;
        }
    }

    /// Record the request and flip the loading flag. Returns the track
    /// id to hand to the callback, or None when there is no current
    /// track to continue from.
    fn mark_refill_requested(&self, core: &mut PlayerCore) -> Option<String> {
        let track_id = core.current_track.as_ref().map(|t| t.id.clone())?;
        core.last_refill_request = Some(Instant::now());
        core.loading_more = true;
        self.publish_locked(core);
        Some(track_id)
    }

    /// Arm the timer that clears `is_loading_more` whether or not new
    /// tracks ever arrive, so a silently failing collaborator cannot
    /// leave the flag stuck.
    async fn arm_refill_reset(&self) {
        let controller = self.clone();
        let reset_after = self.config.refill_reset;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(reset_after).await;
            if !controller.is_connected().await {
                return;
            }
            let mut core = controller.core.lock().await;
            if core.loading_more {
                core.loading_more = false;
                controller.publish_locked(&core);
                tracing::debug!("loading-more flag auto-reset");
            }
        });
        self.store_refill_reset(handle).await;
    }
}
