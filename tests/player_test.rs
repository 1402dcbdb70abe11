//! End-to-end controller tests against a scriptable fake engine
//!
//! The fake engine records every command it receives, maintains its own
//! item list the way a real pipeline would, and lets tests inject events
//! into the controller's listener.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use resonance::engine::{
    EngineError, EngineEvent, EngineEventChannel, EngineItem, EngineState, MediaEngine,
    TransitionReason,
};
use resonance::{ErrorKind, PlayerConfig, PlayerController, RepeatMode, StreamResolver, Track};

// ============================================================================
// Fake engine
// ============================================================================

struct EngineInner {
    items: Vec<EngineItem>,
    current_index: Option<usize>,
    state: EngineState,
    playing: bool,
    position_ms: u64,
    duration_ms: u64,
    commands: Vec<String>,
    senders: Vec<mpsc::UnboundedSender<EngineEvent>>,
}

struct FakeEngine {
    inner: Mutex<EngineInner>,
}

impl FakeEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                items: Vec::new(),
                current_index: None,
                state: EngineState::Idle,
                playing: false,
                position_ms: 0,
                duration_ms: 0,
                commands: Vec::new(),
                senders: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap()
    }

    fn emit(&self, event: EngineEvent) {
        let senders = self.lock().senders.clone();
        for sender in senders {
            let _ = sender.send(event.clone());
        }
    }

    fn item_ids(&self) -> Vec<String> {
        self.lock().items.iter().map(|i| i.track_id.clone()).collect()
    }

    fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    fn set_position(&self, ms: u64) {
        self.lock().position_ms = ms;
    }

    fn set_duration(&self, ms: u64) {
        self.lock().duration_ms = ms;
    }

    fn set_playing(&self, playing: bool) {
        self.lock().playing = playing;
    }

    fn set_state(&self, state: EngineState) {
        self.lock().state = state;
    }
}

impl MediaEngine for FakeEngine {
    fn set_items(&self, items: Vec<EngineItem>, start_index: usize) {
        let mut inner = self.lock();
        inner.commands.push(format!("set_items:{}@{}", items.len(), start_index));
        inner.current_index = if items.is_empty() {
            None
        } else {
            Some(start_index.min(items.len() - 1))
        };
        inner.items = items;
    }

    fn add_item(&self, item: EngineItem) {
        let mut inner = self.lock();
        inner.commands.push(format!("add_item:{}", item.track_id));
        inner.items.push(item);
    }

    fn remove_item(&self, index: usize) {
        let mut inner = self.lock();
        inner.commands.push(format!("remove_item:{}", index));
        if index < inner.items.len() {
            inner.items.remove(index);
            if let Some(current) = inner.current_index {
                if inner.items.is_empty() {
                    inner.current_index = None;
                } else if index < current {
                    inner.current_index = Some(current - 1);
                } else if current >= inner.items.len() {
                    inner.current_index = Some(inner.items.len() - 1);
                }
            }
        }
    }

    fn move_item(&self, from: usize, to: usize) {
        let mut inner = self.lock();
        inner.commands.push(format!("move_item:{}->{}", from, to));
        if from < inner.items.len() && to < inner.items.len() {
            let item = inner.items.remove(from);
            inner.items.insert(to, item);
        }
    }

    fn clear_items(&self) {
        let mut inner = self.lock();
        inner.commands.push("clear_items".to_string());
        inner.items.clear();
        inner.current_index = None;
        inner.playing = false;
    }

    fn prepare(&self) {
        self.lock().commands.push("prepare".to_string());
    }

    fn play(&self) {
        let mut inner = self.lock();
        inner.commands.push("play".to_string());
        inner.playing = true;
    }

    fn pause(&self) {
        let mut inner = self.lock();
        inner.commands.push("pause".to_string());
        inner.playing = false;
    }

    fn stop(&self) {
        let mut inner = self.lock();
        inner.commands.push("stop".to_string());
        inner.playing = false;
    }

    fn seek_to_ms(&self, position_ms: u64) {
        let mut inner = self.lock();
        inner.commands.push(format!("seek_to_ms:{}", position_ms));
        inner.position_ms = position_ms;
    }

    fn seek_to_item(&self, index: usize, position_ms: u64) {
        let mut inner = self.lock();
        inner.commands.push(format!("seek_to_item:{}@{}", index, position_ms));
        if index < inner.items.len() {
            inner.current_index = Some(index);
        }
        inner.position_ms = position_ms;
    }

    fn seek_to_next(&self) {
        let mut inner = self.lock();
        inner.commands.push("seek_to_next".to_string());
        if let Some(current) = inner.current_index {
            if current + 1 < inner.items.len() {
                inner.current_index = Some(current + 1);
                inner.position_ms = 0;
            }
        }
    }

    fn seek_to_previous(&self) {
        let mut inner = self.lock();
        inner.commands.push("seek_to_previous".to_string());
        if let Some(current) = inner.current_index {
            if current > 0 {
                inner.current_index = Some(current - 1);
                inner.position_ms = 0;
            }
        }
    }

    fn set_shuffle_enabled(&self, enabled: bool) {
        self.lock().commands.push(format!("shuffle:{}", enabled));
    }

    fn set_repeat_mode(&self, mode: RepeatMode) {
        self.lock().commands.push(format!("repeat:{:?}", mode));
    }

    fn set_playback_speed(&self, speed: f32) {
        self.lock().commands.push(format!("speed:{}", speed));
    }

    fn state(&self) -> EngineState {
        self.lock().state
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn position_ms(&self) -> u64 {
        self.lock().position_ms
    }

    fn duration_ms(&self) -> u64 {
        self.lock().duration_ms
    }

    fn current_index(&self) -> Option<usize> {
        self.lock().current_index
    }

    fn current_track_id(&self) -> Option<String> {
        let inner = self.lock();
        inner
            .current_index
            .and_then(|i| inner.items.get(i))
            .map(|item| item.track_id.clone())
    }

    fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    fn has_next(&self) -> bool {
        let inner = self.lock();
        match inner.current_index {
            Some(current) => current + 1 < inner.items.len(),
            None => !inner.items.is_empty(),
        }
    }

    fn has_previous(&self) -> bool {
        self.lock().current_index.is_some_and(|c| c > 0)
    }

    fn event_channel(&self) -> EngineEventChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().senders.push(tx);
        rx
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn track(id: &str, duration_secs: u64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Artist".to_string(),
        album: Some("Album".to_string()),
        artwork_ref: None,
        duration_secs,
    }
}

fn urls(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(id, url)| (id.to_string(), url.to_string()))
        .collect()
}

fn snapshot_ids(controller: &PlayerController) -> Vec<String> {
    controller
        .queue_snapshot()
        .tracks
        .iter()
        .map(|t| t.id.clone())
        .collect()
}

/// Poll until `cond` holds or ~2s pass
async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Send + Sync + 'static) {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |id: String| sink.lock().unwrap().push(id))
}

struct MapResolver {
    urls: HashMap<String, String>,
    fail: HashSet<String>,
    delay: Duration,
}

impl MapResolver {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            urls: urls(pairs),
            fail: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    fn failing(mut self, id: &str) -> Self {
        self.fail.insert(id.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl StreamResolver for MapResolver {
    async fn resolve(&self, track_id: &str) -> Result<String> {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.contains(track_id) {
            anyhow::bail!("resolution failed for {}", track_id);
        }
        self.urls
            .get(track_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no url for {}", track_id))
    }
}

// ============================================================================
// Queue / engine consistency
// ============================================================================

#[tokio::test]
async fn queue_mirrors_engine_through_mutations() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100), track("c", 100), track("d", 100)],
            urls(&[("a", "ua"), ("b", "ub"), ("c", "uc"), ("d", "ud")]),
            0,
        )
        .await;
    assert_eq!(engine.item_ids(), snapshot_ids(&controller));

    controller
        .append(
            vec![track("e", 100), track("a", 100)],
            urls(&[("e", "ue"), ("a", "ua")]),
        )
        .await;
    assert_eq!(engine.item_ids(), snapshot_ids(&controller));
    assert_eq!(snapshot_ids(&controller), vec!["a", "b", "c", "d", "e"]);

    controller.remove(1).await;
    assert_eq!(engine.item_ids(), snapshot_ids(&controller));
    assert_eq!(snapshot_ids(&controller), vec!["a", "c", "d", "e"]);

    controller.reorder(0, 2).await;
    assert_eq!(engine.item_ids(), snapshot_ids(&controller));
    assert_eq!(snapshot_ids(&controller), vec!["c", "d", "a", "e"]);

    controller.clear().await;
    assert_eq!(engine.item_count(), 0);
    assert!(snapshot_ids(&controller).is_empty());
    assert_eq!(controller.queue_snapshot().current_index, -1);
}

#[tokio::test]
async fn appending_duplicate_id_leaves_queue_unchanged() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100)],
            urls(&[("a", "ua"), ("b", "ub")]),
            0,
        )
        .await;

    controller.append(vec![track("a", 100)], urls(&[("a", "ua2")])).await;

    assert_eq!(snapshot_ids(&controller), vec!["a", "b"]);
    assert_eq!(engine.item_ids(), vec!["a", "b"]);
}

#[tokio::test]
async fn current_index_follows_track_identity_across_mutations() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100), track("c", 100)],
            urls(&[("a", "ua"), ("b", "ub"), ("c", "uc")]),
            2,
        )
        .await;
    assert_eq!(controller.queue_snapshot().current_index, 2);

    // Removing before the current entry shifts the index but not the track
    controller.remove(0).await;
    let snapshot = controller.queue_snapshot();
    assert_eq!(snapshot.current_index, 1);
    assert_eq!(snapshot.tracks[snapshot.current_index as usize].id, "c");

    // Reordering around the current entry keeps pointing at it
    controller.reorder(1, 0).await;
    let snapshot = controller.queue_snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.tracks[0].id, "c");
}

// ============================================================================
// Refill policy
// ============================================================================

#[tokio::test]
async fn play_single_requests_refill_in_the_same_tick() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    let (seen, callback) = recorder();
    controller.on_queue_needs_more(callback).await;
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "https://cdn.example/a").await;

    // First-ever check is never suppressed by cooldown, and a single
    // track has zero remaining
    assert_eq!(seen.lock().unwrap().clone(), vec!["a".to_string()]);
    assert!(controller.playback_state().is_loading_more);
}

#[tokio::test]
async fn refill_cooldown_allows_one_request_but_ended_overrides() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        refill_cooldown: Duration::from_secs(60),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    let (seen, callback) = recorder();
    controller.on_queue_needs_more(callback).await;
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "ua").await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Second trigger inside the cooldown window: suppressed
    engine.emit(EngineEvent::ItemTransition {
        index: 0,
        track_id: "a".to_string(),
        reason: TransitionReason::Seek,
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Playback ended: fires regardless of cooldown
    engine.emit(EngineEvent::StateChanged { state: EngineState::Ended });
    assert!(wait_until(|| seen.lock().unwrap().len() == 2).await);
}

#[tokio::test]
async fn force_refill_check_clears_the_cooldown_gate() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        refill_cooldown: Duration::from_secs(60),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    let (seen, callback) = recorder();
    controller.on_queue_needs_more(callback).await;
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "ua").await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    controller.force_refill_check().await;
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn loading_more_flag_resets_even_when_nothing_arrives() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        refill_reset: Duration::from_millis(100),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    let (_seen, callback) = recorder();
    controller.on_queue_needs_more(callback).await;
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "ua").await;
    assert!(controller.playback_state().is_loading_more);

    assert!(wait_until(|| !controller.playback_state().is_loading_more).await);
}

#[tokio::test]
async fn dead_end_skip_requests_refill_directly() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        refill_cooldown: Duration::from_secs(60),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    let (seen, callback) = recorder();
    controller.on_queue_needs_more(callback).await;
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "ua").await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    // No next item and still inside the cooldown: the direct request
    // from a stuck skip bypasses both gates
    controller.skip_to_next().await;
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(!engine.commands().contains(&"seek_to_next".to_string()));
}

// ============================================================================
// Seek
// ============================================================================

#[tokio::test]
async fn seek_clamps_into_the_track() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 200)], urls(&[("a", "ua")]), 0)
        .await;

    controller.seek_to_fraction(-0.5).await;
    assert!(engine.commands().contains(&"seek_to_ms:0".to_string()));

    controller.seek_to_fraction(1.5).await;
    assert!(engine.commands().contains(&"seek_to_ms:200000".to_string()));

    controller.seek_to_fraction(0.5).await;
    assert!(engine.commands().contains(&"seek_to_ms:100000".to_string()));
    let state = controller.playback_state();
    assert!(state.position_ms >= 100_000 && state.position_ms < 100_200);
}

#[tokio::test]
async fn ticker_does_not_overwrite_a_fresh_seek() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        seek_grace: Duration::from_millis(500),
        tick_interval: Duration::from_millis(50),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 200)], urls(&[("a", "ua")]), 0)
        .await;
    engine.set_playing(true);
    engine.emit(EngineEvent::IsPlayingChanged { is_playing: true });
    assert!(wait_until(|| controller.playback_state().is_playing).await);

    controller.seek_to_fraction(0.5).await;
    // Simulate an engine that has not caught up with the seek yet
    engine.set_position(0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let state = controller.playback_state();
    assert!(
        state.position_ms >= 100_000,
        "optimistic seek position was overwritten during the grace window: {}",
        state.position_ms
    );

    // After the grace window the ticker samples the engine again
    tokio::time::sleep(Duration::from_millis(500)).await;
    let state = controller.playback_state();
    assert!(
        state.position_ms < 50_000,
        "stale position expected after grace window, got {}",
        state.position_ms
    );
}

// ============================================================================
// Partial resolution and errors
// ============================================================================

#[tokio::test]
async fn unresolved_tracks_are_dropped_without_error() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100), track("c", 100)],
            urls(&[("a", "ua"), ("c", "uc")]),
            0,
        )
        .await;

    assert_eq!(engine.item_ids(), vec!["a", "c"]);
    assert_eq!(snapshot_ids(&controller), vec!["a", "c"]);
    assert!(controller.playback_state().last_error.is_none());
}

#[tokio::test]
async fn fully_unresolved_queue_leaves_engine_untouched() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 100), track("b", 100)], HashMap::new(), 0)
        .await;

    assert_eq!(engine.item_count(), 0);
    assert!(engine.commands().is_empty());
}

#[tokio::test]
async fn http_error_requests_fresh_url_for_current_track() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    let (seen, callback) = recorder();
    controller.on_stream_url_expired(callback).await;
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100)],
            urls(&[("a", "ua"), ("b", "ub")]),
            0,
        )
        .await;

    engine.emit(EngineEvent::PlayerError { code: EngineError::BadHttpStatus });
    assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);

    assert_eq!(seen.lock().unwrap().clone(), vec!["a".to_string()]);
    // The failure must not advance the queue
    assert_eq!(controller.queue_snapshot().current_index, 0);
    let state = controller.playback_state();
    let error = state.last_error.expect("error should be published");
    assert_eq!(error.kind, ErrorKind::Network);
}

#[tokio::test]
async fn decoder_error_is_published_without_url_refresh() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    let (seen, callback) = recorder();
    controller.on_stream_url_expired(callback).await;
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 100)], urls(&[("a", "ua")]), 0)
        .await;

    engine.emit(EngineEvent::PlayerError { code: EngineError::DecoderInitFailed });
    assert!(wait_until(|| controller.playback_state().last_error.is_some()).await);

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(
        controller.playback_state().last_error.unwrap().kind,
        ErrorKind::Playback
    );
}

#[tokio::test]
async fn error_clears_when_playback_recovers() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 100)], urls(&[("a", "ua")]), 0)
        .await;

    engine.emit(EngineEvent::PlayerError { code: EngineError::NetworkConnectionFailed });
    assert!(wait_until(|| controller.playback_state().last_error.is_some()).await);

    engine.emit(EngineEvent::StateChanged { state: EngineState::Ready });
    assert!(wait_until(|| controller.playback_state().last_error.is_none()).await);
}

// ============================================================================
// Engine event handling
// ============================================================================

#[tokio::test]
async fn item_transition_updates_current_track_and_index() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 120), track("c", 100)],
            urls(&[("a", "ua"), ("b", "ub"), ("c", "uc")]),
            0,
        )
        .await;

    engine.emit(EngineEvent::ItemTransition {
        index: 1,
        track_id: "b".to_string(),
        reason: TransitionReason::Auto,
    });
    assert!(
        wait_until(|| {
            controller
                .playback_state()
                .current_track
                .as_ref()
                .is_some_and(|t| t.id == "b")
        })
        .await
    );

    let state = controller.playback_state();
    assert_eq!(state.duration_ms, 120_000);
    assert_eq!(controller.queue_snapshot().current_index, 1);
}

#[tokio::test]
async fn connect_adopts_state_of_an_already_running_engine() {
    let engine = FakeEngine::new();
    engine.set_playing(true);
    engine.set_position(5_000);
    engine.set_duration(60_000);
    engine.set_state(EngineState::Ready);

    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    let state = controller.playback_state();
    assert!(state.is_playing);
    assert!(state.position_ms >= 5_000 && state.position_ms < 8_000);
    assert_eq!(state.duration_ms, 60_000);
}

#[tokio::test]
async fn connect_twice_is_idempotent() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 100)], urls(&[("a", "ua")]), 0)
        .await;

    // A duplicate connect must not have attached a second listener;
    // one injected error produces exactly one published error
    let (seen, callback) = recorder();
    controller.on_stream_url_expired(callback).await;
    engine.emit(EngineEvent::PlayerError { code: EngineError::BadHttpStatus });
    assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn toggle_after_ended_rewinds_before_playing() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(vec![track("a", 100)], urls(&[("a", "ua")]), 0)
        .await;
    engine.set_playing(false);
    engine.set_state(EngineState::Ended);

    controller.toggle_play_pause().await;

    let commands = engine.commands();
    let seek_pos = commands.iter().position(|c| c == "seek_to_ms:0").unwrap();
    let play_pos = commands.iter().rposition(|c| c == "play").unwrap();
    assert!(seek_pos < play_pos, "rewind must precede play: {:?}", commands);
}

#[tokio::test]
async fn previous_restarts_when_far_into_the_track() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller
        .play_queue(
            vec![track("a", 100), track("b", 100)],
            urls(&[("a", "ua"), ("b", "ub")]),
            1,
        )
        .await;

    engine.set_position(10_000);
    controller.skip_to_previous().await;
    assert!(engine.commands().contains(&"seek_to_ms:0".to_string()));
    assert!(!engine.commands().contains(&"seek_to_previous".to_string()));

    engine.set_position(1_000);
    controller.skip_to_previous().await;
    assert!(engine.commands().contains(&"seek_to_previous".to_string()));
}

// ============================================================================
// Lazy playback
// ============================================================================

#[tokio::test]
async fn play_lazy_starts_target_then_prefetches_the_rest() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        lazy_batch_size: 2,
        lazy_batch_pause: Duration::from_millis(10),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    controller.connect(engine.clone()).await;

    let resolver = Arc::new(MapResolver::new(&[
        ("a", "ua"),
        ("b", "ub"),
        ("c", "uc"),
        ("d", "ud"),
    ]));

    controller
        .play_lazy(
            vec![track("a", 100), track("b", 100), track("c", 100), track("d", 100)],
            2,
            resolver,
        )
        .await;

    // Instant feedback: the target is published before any resolution
    let state = controller.playback_state();
    assert_eq!(state.current_track.unwrap().id, "c");
    assert!(state.is_buffering);

    // Circular order: [target, tail-after-target, head-before-target]
    assert!(wait_until(|| snapshot_ids(&controller) == vec!["c", "d", "a", "b"]).await);
    assert_eq!(engine.item_ids(), vec!["c", "d", "a", "b"]);
}

#[tokio::test]
async fn play_lazy_drops_tracks_that_fail_to_resolve() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        lazy_batch_size: 2,
        lazy_batch_pause: Duration::from_millis(10),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    controller.connect(engine.clone()).await;

    let resolver = Arc::new(
        MapResolver::new(&[("a", "ua"), ("b", "ub"), ("c", "uc")]).failing("b"),
    );

    controller
        .play_lazy(vec![track("a", 100), track("b", 100), track("c", 100)], 0, resolver)
        .await;

    assert!(wait_until(|| snapshot_ids(&controller) == vec!["a", "c"]).await);
}

#[tokio::test]
async fn play_lazy_target_failure_publishes_error_and_stops_buffering() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    let resolver = Arc::new(MapResolver::new(&[("b", "ub")]).failing("a"));

    controller
        .play_lazy(vec![track("a", 100), track("b", 100)], 0, resolver)
        .await;

    assert!(wait_until(|| controller.playback_state().last_error.is_some()).await);
    let state = controller.playback_state();
    assert!(!state.is_buffering);
    assert_eq!(engine.item_count(), 0);
}

#[tokio::test]
async fn disconnect_stops_the_prefetch_pipeline() {
    let engine = FakeEngine::new();
    let config = PlayerConfig {
        lazy_batch_size: 1,
        lazy_batch_pause: Duration::from_millis(50),
        ..PlayerConfig::default()
    };
    let controller = PlayerController::new(config);
    controller.connect(engine.clone()).await;

    let resolver = Arc::new(
        MapResolver::new(&[("a", "ua"), ("b", "ub"), ("c", "uc"), ("d", "ud"), ("e", "ue")])
            .with_delay(Duration::from_millis(30)),
    );

    controller
        .play_lazy(
            vec![track("a", 100), track("b", 100), track("c", 100), track("d", 100), track("e", 100)],
            0,
            resolver,
        )
        .await;

    // Let the target start, then tear the session down mid-prefetch
    assert!(wait_until(|| !snapshot_ids(&controller).is_empty()).await);
    controller.disconnect().await;
    let len_at_disconnect = snapshot_ids(&controller).len();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(snapshot_ids(&controller).len(), len_at_disconnect);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn operations_while_disconnected_are_silent_no_ops() {
    let controller = PlayerController::new(PlayerConfig::default());

    controller.play_single(track("a", 100), "ua").await;
    controller
        .play_queue(vec![track("a", 100)], urls(&[("a", "ua")]), 0)
        .await;
    controller.append(vec![track("b", 100)], urls(&[("b", "ub")])).await;
    controller.remove(0).await;
    controller.reorder(0, 1).await;
    controller.clear().await;
    controller.toggle_play_pause().await;
    controller.skip_to_next().await;
    controller.skip_to_previous().await;
    controller.seek_to_fraction(0.5).await;
    controller.disconnect().await;

    assert!(controller.playback_state().current_track.is_none());
    assert!(snapshot_ids(&controller).is_empty());
}

#[tokio::test]
async fn late_subscribers_see_the_latest_state_immediately() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller.play_single(track("a", 100), "ua").await;

    let state_rx = controller.subscribe_state();
    assert_eq!(state_rx.borrow().current_track.as_ref().unwrap().id, "a");

    let queue_rx = controller.subscribe_queue();
    assert_eq!(queue_rx.borrow().tracks.len(), 1);
}

#[tokio::test]
async fn settings_are_clamped_and_forwarded() {
    let engine = FakeEngine::new();
    let controller = PlayerController::new(PlayerConfig::default());
    controller.connect(engine.clone()).await;

    controller.set_playback_speed(5.0).await;
    assert_eq!(controller.playback_state().playback_speed, 2.0);
    assert!(engine.commands().contains(&"speed:2".to_string()));

    controller.set_playback_speed(0.1).await;
    assert_eq!(controller.playback_state().playback_speed, 0.5);

    controller.cycle_repeat_mode().await;
    assert_eq!(controller.playback_state().repeat_mode, RepeatMode::All);
    controller.cycle_repeat_mode().await;
    assert_eq!(controller.playback_state().repeat_mode, RepeatMode::One);
    controller.cycle_repeat_mode().await;
    assert_eq!(controller.playback_state().repeat_mode, RepeatMode::Off);

    controller.set_shuffle(true).await;
    assert!(controller.playback_state().shuffle_enabled);
    assert!(engine.commands().contains(&"shuffle:true".to_string()));
}
