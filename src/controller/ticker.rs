//! Position ticker
//!
//! A cooperative polling loop that samples engine position/duration
//! while playing, at a cadence fast enough for a smooth seek bar. Runs
//! only between an engine playing=true and the matching pause/disconnect,
//! and never overwrites a fresh user seek (the timing state drops
//! samples inside the grace window).

use tokio::time::MissedTickBehavior;

use super::PlayerController;

impl PlayerController {
    /// Start the ticker. Restart-safe: any previous ticker task is
    /// cancelled first, so double starts cannot stack loops.
    pub(crate) async fn start_ticker(&self) {
        self.abort_ticker().await;
        let Some(engine) = self.engine().await else {
            return;
        };
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(controller.config.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !controller.is_connected().await {
                    break;
                }
                let mut core = controller.core.lock().await;
                if core.timing.in_seek_grace() {
                    continue;
                }
                core.timing.sample(engine.position_ms(), engine.duration_ms());
                controller.publish_locked(&core);
            }
        });
        self.store_ticker(handle).await;
        tracing::debug!("position ticker started");
    }
}
