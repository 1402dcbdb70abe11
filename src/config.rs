//! Tunable parameters for the playback controller

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the player controller
///
/// The refill and seek timings are deliberately parameters rather than
/// hard-coded constants so hosts can tighten them for tests or tune them
/// for slow networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Remaining-track count at or below which a refill is requested (default: 2)
    pub low_watermark: usize,

    /// Minimum interval between automatic refill requests (default: 5s)
    pub refill_cooldown: Duration,

    /// How long `is_loading_more` may stay set before it is cleared
    /// regardless of whether tracks arrived (default: 5s)
    pub refill_reset: Duration,

    /// Window after a user seek during which the position ticker must not
    /// overwrite the optimistic position (default: 500ms)
    pub seek_grace: Duration,

    /// Position ticker cadence while playing (default: 100ms)
    pub tick_interval: Duration,

    /// Number of tracks resolved per batch during lazy playback (default: 5)
    pub lazy_batch_size: usize,

    /// Pause between lazy resolution batches (default: 250ms)
    pub lazy_batch_pause: Duration,

    /// "Previous" restarts the current track when this far in (default: 3s)
    pub previous_restart_threshold: Duration,

    /// Lower bound for playback speed (default: 0.5)
    pub min_playback_speed: f32,

    /// Upper bound for playback speed (default: 2.0)
    pub max_playback_speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            low_watermark: 2,
            refill_cooldown: Duration::from_secs(5),
            refill_reset: Duration::from_secs(5),
            seek_grace: Duration::from_millis(500),
            tick_interval: Duration::from_millis(100),
            lazy_batch_size: 5,
            lazy_batch_pause: Duration::from_millis(250),
            previous_restart_threshold: Duration::from_secs(3),
            min_playback_speed: 0.5,
            max_playback_speed: 2.0,
        }
    }
}
