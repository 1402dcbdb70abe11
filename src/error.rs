//! Error classification for published playback errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Broad bucket a published error falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Stream transport failure; a fresh URL is being requested
    Network,
    /// Local decode/render failure or a failed resolution
    Playback,
}

/// A user-presentable error record published as part of playback state
///
/// Cleared automatically the next time the engine reaches a ready or
/// playing state. The timestamp lets surfaces age stale errors out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackErrorInfo {
    pub message: String,
    pub kind: ErrorKind,
    pub at: DateTime<Utc>,
}

impl PlaybackErrorInfo {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            at: Utc::now(),
        }
    }
}

/// Map an engine failure code to a published error record
pub(crate) fn classify_engine_error(code: &EngineError) -> PlaybackErrorInfo {
    let kind = if code.is_network() {
        ErrorKind::Network
    } else {
        ErrorKind::Playback
    };

    let message = match code {
        EngineError::BadHttpStatus | EngineError::FileNotFound => {
            "Stream link expired or unavailable. Fetching a fresh one...".to_string()
        }
        EngineError::NetworkConnectionFailed => {
            "Network connection failed. Check your connection.".to_string()
        }
        EngineError::NetworkConnectionTimeout => {
            "Network timed out. Trying again in the background.".to_string()
        }
        EngineError::InvalidContentType => "Stream format not recognized.".to_string(),
        other => format!("Playback error: {}", other),
    };

    PlaybackErrorInfo { message, kind, at: Utc::now() }
}

/// Error record for a track whose stream could not be resolved
pub(crate) fn resolution_error(title: &str) -> PlaybackErrorInfo {
    PlaybackErrorInfo::new(
        ErrorKind::Playback,
        format!("Couldn't start \"{}\". Try again.", title),
    )
}
