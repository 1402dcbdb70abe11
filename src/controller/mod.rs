//! Controller module - playback coordination
//!
//! This module contains the player controller: the single authority over
//! what plays next. It owns the queue and the stream-URL cache, drives
//! the media engine, reacts to its events, and publishes observable
//! playback state to any number of subscribers. It is organized into
//! submodules by responsibility:
//!
//! - `playback`: Transport operations (play/pause/skip/seek/modes)
//! - `queue`: Queue mutation operations, including lazy playback
//! - `refill`: Low-watermark queue refill policy
//! - `player_events`: Engine event listener
//! - `ticker`: Position polling while playing

mod playback;
mod player_events;
mod queue;
mod refill;
mod ticker;

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PlayerConfig;
use crate::engine::{EngineState, MediaEngine};
use crate::error::PlaybackErrorInfo;
use crate::model::{
    PlaybackState, PlaybackTiming, PlayerSettings, QueueSnapshot, QueueStore, StreamCache, Track,
};

type TrackCallback = Box<dyn Fn(String) + Send + Sync>;

/// Mutable player state, serialized behind one lock
///
/// Every queue/engine mutation and every state publication goes through
/// this, so a `remove` and a concurrently arriving item-transition event
/// can never interleave mid-mutation.
pub(crate) struct PlayerCore {
    pub(crate) queue: QueueStore,
    pub(crate) timing: PlaybackTiming,
    pub(crate) settings: PlayerSettings,
    /// Published current track. May briefly run ahead of the queue
    /// during lazy playback, where the target is announced before its
    /// stream is resolved.
    pub(crate) current_track: Option<Track>,
    pub(crate) last_error: Option<PlaybackErrorInfo>,
    pub(crate) loading_more: bool,
    /// Last refill request instant; None means no request has ever fired
    pub(crate) last_refill_request: Option<Instant>,
}

impl PlayerCore {
    fn new() -> Self {
        Self {
            queue: QueueStore::new(),
            timing: PlaybackTiming::default(),
            settings: PlayerSettings::default(),
            current_track: None,
            last_error: None,
            loading_more: false,
            last_refill_request: None,
        }
    }

    pub(crate) fn snapshot(&self) -> PlaybackState {
        let position_ms = self.timing.current_position_ms();
        let duration_ms = self.timing.duration_ms();
        PlaybackState {
            current_track: self.current_track.clone(),
            is_playing: self.timing.is_playing,
            is_buffering: self.timing.is_buffering,
            position_ms,
            duration_ms,
            progress: self.timing.progress_fraction(),
            repeat_mode: self.settings.repeat,
            shuffle_enabled: self.settings.shuffle_enabled,
            playback_speed: self.settings.playback_speed,
            is_loading_more: self.loading_more,
            last_error: self.last_error.clone(),
        }
    }
}

/// Single-slot collaborator callbacks
///
/// Exactly one collaborator owns queue continuation and URL refresh, so
/// these are single registrations, not multicast listeners.
#[derive(Default)]
struct Callbacks {
    needs_more: Mutex<Option<TrackCallback>>,
    url_expired: Mutex<Option<TrackCallback>>,
}

/// Background task handles owned by the controller
#[derive(Default)]
struct TaskHandles {
    listener: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    refill_reset: Option<JoinHandle<()>>,
    prefetch: Option<JoinHandle<()>>,
}

impl TaskHandles {
    fn abort_all(&mut self) {
        for handle in [
            self.listener.take(),
            self.ticker.take(),
            self.refill_reset.take(),
            self.prefetch.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

/// The playback coordinator
///
/// Clone-able handle; clones share the same underlying player. All
/// operations are safe to call while disconnected (they log and no-op)
/// and tolerate rapid, racy UI input without panicking.
#[derive(Clone)]
pub struct PlayerController {
    pub(crate) config: PlayerConfig,
    pub(crate) core: Arc<Mutex<PlayerCore>>,
    session: Arc<Mutex<Option<Arc<dyn MediaEngine>>>>,
    pub(crate) cache: StreamCache,
    callbacks: Arc<Callbacks>,
    tasks: Arc<Mutex<TaskHandles>>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    queue_tx: Arc<watch::Sender<QueueSnapshot>>,
}

impl PlayerController {
    pub fn new(config: PlayerConfig) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::default());
        let (queue_tx, _) = watch::channel(QueueSnapshot::default());
        Self {
            config,
            core: Arc::new(Mutex::new(PlayerCore::new())),
            session: Arc::new(Mutex::new(None)),
            cache: StreamCache::new(),
            callbacks: Arc::new(Callbacks::default()),
            tasks: Arc::new(Mutex::new(TaskHandles::default())),
            state_tx: Arc::new(state_tx),
            queue_tx: Arc::new(queue_tx),
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Attach to a media engine. Idempotent: a second call while
    /// connected is ignored.
    ///
    /// Published state is synchronized from the engine's current status
    /// immediately, before any event arrives - the engine may already be
    /// mid-playback if the UI process restarted underneath it.
    pub async fn connect(&self, engine: Arc<dyn MediaEngine>) {
        {
            let mut session = self.session.lock().await;
            if session.is_some() {
                tracing::debug!("connect ignored: already connected");
                return;
            }
            *session = Some(engine.clone());
        }
        tracing::info!("connected to media engine");

        {
            let mut core = self.core.lock().await;
            core.timing.sample(engine.position_ms(), engine.duration_ms());
            core.timing.is_playing = engine.is_playing();
            core.timing.is_buffering = engine.state() == EngineState::Buffering;
            if let Some(index) = engine.current_index() {
                core.queue.set_current(index);
            }
            if let Some(id) = engine.current_track_id() {
                if let Some(position) = core.queue.position_of_id(&id) {
                    core.queue.set_current(position);
                }
            }
            if let Some(track) = core.queue.current_track().cloned() {
                core.current_track = Some(track);
            }
            self.publish_locked(&core);
            self.publish_queue_locked(&core);
        }

        let listener = self.spawn_event_listener(engine.event_channel());
        {
            let mut tasks = self.tasks.lock().await;
            if let Some(old) = tasks.listener.replace(listener) {
                old.abort();
            }
        }

        if engine.is_playing() {
            self.start_ticker().await;
        }
    }

    /// Detach from the engine, stopping the ticker, the event listener,
    /// and any pending refill/prefetch work. Safe to call repeatedly and
    /// before any `connect`.
    pub async fn disconnect(&self) {
        {
            let mut session = self.session.lock().await;
            if session.take().is_none() {
                tracing::debug!("disconnect ignored: not connected");
                return;
            }
        }
        self.tasks.lock().await.abort_all();
        tracing::info!("disconnected from media engine");
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub(crate) async fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.session.lock().await.clone()
    }

    // ========================================================================
    // Published state
    // ========================================================================

    /// Subscribe to playback state. The receiver sees the latest value
    /// immediately, then every subsequent update.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to queue snapshots, same delivery semantics as
    /// [`subscribe_state`](Self::subscribe_state).
    pub fn subscribe_queue(&self) -> watch::Receiver<QueueSnapshot> {
        self.queue_tx.subscribe()
    }

    /// Latest published playback state
    pub fn playback_state(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    /// Latest published queue snapshot
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue_tx.borrow().clone()
    }

    pub(crate) fn publish_locked(&self, core: &PlayerCore) {
        self.state_tx.send_replace(core.snapshot());
    }

    pub(crate) fn publish_queue_locked(&self, core: &PlayerCore) {
        self.queue_tx.send_replace(core.queue.snapshot());
    }

    /// Publish an error record, optionally dropping the buffering flag
    /// (used when a pending load will never complete).
    pub(crate) async fn publish_error(&self, info: PlaybackErrorInfo, clear_buffering: bool) {
        let mut core = self.core.lock().await;
        if clear_buffering {
            core.timing.is_buffering = false;
        }
        core.last_error = Some(info);
        self.publish_locked(&core);
    }

    // ========================================================================
    // Collaborator callbacks
    // ========================================================================

    /// Register the collaborator that can fetch continuation tracks.
    /// Invoked with the current track's id whenever the refill policy
    /// fires; the collaborator is expected to eventually call
    /// [`append`](Self::append).
    pub async fn on_queue_needs_more(&self, callback: impl Fn(String) + Send + Sync + 'static) {
        *self.callbacks.needs_more.lock().await = Some(Box::new(callback));
    }

    /// Register the collaborator that re-resolves expired stream URLs.
    /// Invoked with the failing track's id on network-class engine
    /// errors; the collaborator supplies the fresh URL via
    /// [`update_stream_url`](Self::update_stream_url).
    pub async fn on_stream_url_expired(&self, callback: impl Fn(String) + Send + Sync + 'static) {
        *self.callbacks.url_expired.lock().await = Some(Box::new(callback));
    }

    pub(crate) async fn invoke_needs_more(&self, track_id: &str) {
        let slot = self.callbacks.needs_more.lock().await;
        match slot.as_ref() {
            Some(callback) => callback(track_id.to_string()),
            None => tracing::debug!("queue needs more tracks but no callback is registered"),
        }
    }

    pub(crate) async fn invoke_url_expired(&self, track_id: &str) {
        let slot = self.callbacks.url_expired.lock().await;
        match slot.as_ref() {
            Some(callback) => callback(track_id.to_string()),
            None => tracing::debug!("stream URL expired but no callback is registered"),
        }
    }

    // ========================================================================
    // Task handle plumbing
    // ========================================================================

    pub(crate) async fn store_ticker(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.ticker.replace(handle) {
            old.abort();
        }
    }

    pub(crate) async fn abort_ticker(&self) {
        let mut tasks = self.tasks.lock().await;
        if let Some(handle) = tasks.ticker.take() {
            handle.abort();
        }
    }

    pub(crate) async fn store_refill_reset(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.refill_reset.replace(handle) {
            old.abort();
        }
    }

    pub(crate) async fn store_prefetch(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.prefetch.replace(handle) {
            old.abort();
        }
    }
}
