//! Resonance - playback and queue continuity core
//!
//! The coordination layer of a streaming music player: everything
//! between the UI surfaces (mini-player, full player, notification) and
//! the platform media engine. It keeps audio flowing across expired
//! stream URLs, network failures, and auto-extending queues, and gives
//! every surface the same consistent view of playback.
//!
//! This crate provides:
//! - A [`PlayerController`] owning the queue, the resolved-URL cache,
//!   and the engine session, with transport and queue operations that
//!   are always safe to call (disconnected or invalid calls no-op)
//! - Observable playback/queue state over `tokio::sync::watch` - late
//!   subscribers see the latest value immediately, then every update
//! - A low-watermark refill policy with cooldown, so a single played
//!   track grows into a continuous queue through the registered
//!   `on_queue_needs_more` collaborator
//! - Engine error classification that routes expired-stream failures to
//!   the `on_stream_url_expired` collaborator instead of retrying dead
//!   URLs
//! - Lazy queue playback: instant start on one resolved track, with the
//!   rest resolved in background batches
//! - A position ticker for slider-smooth progress, suppressed during
//!   user seeks
//!
//! # Architecture
//!
//! The crate is platform-agnostic. The audio pipeline is consumed
//! through the [`engine::MediaEngine`] trait (commands in, events out
//! over a channel) and stream resolution through
//! [`resolver::StreamResolver`]; hosts provide both. No UI, storage, or
//! network code lives here.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod resolver;

mod controller;

// Public exports
pub use config::PlayerConfig;
pub use controller::PlayerController;
pub use error::{ErrorKind, PlaybackErrorInfo};
pub use model::{PlaybackState, QueueSnapshot, RepeatMode, Track};
pub use resolver::StreamResolver;
