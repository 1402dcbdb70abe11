//! Cache of resolved stream URLs keyed by track id

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A resolved stream URL for a track
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub track_id: String,
    pub url: String,
    pub resolved_at: DateTime<Utc>,
}

/// In-memory cache of resolved stream URLs
///
/// One entry per track id, overwritten on re-resolution (signed URLs
/// expire). Entries live exactly as long as their track is queued; the
/// controller prunes on removal and clears with the queue. Nothing here
/// is persisted.
#[derive(Clone, Default)]
pub struct StreamCache {
    entries: Arc<RwLock<HashMap<String, ResolvedStream>>>,
}

impl StreamCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or overwrite the URL for a track
    pub async fn insert(&self, track_id: &str, url: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(
            track_id.to_string(),
            ResolvedStream {
                track_id: track_id.to_string(),
                url: url.to_string(),
                resolved_at: Utc::now(),
            },
        );
    }

    /// Bulk insert, overwriting any existing entries
    pub async fn insert_many(&self, urls: &HashMap<String, String>) {
        let mut entries = self.entries.write().await;
        for (track_id, url) in urls {
            entries.insert(
                track_id.clone(),
                ResolvedStream {
                    track_id: track_id.clone(),
                    url: url.clone(),
                    resolved_at: Utc::now(),
                },
            );
        }
    }

    pub async fn get_url(&self, track_id: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(track_id).map(|e| e.url.clone())
    }

    pub async fn remove(&self, track_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(track_id);
    }

    /// Drop every entry whose track id is not in `ids`
    pub async fn retain_ids(&self, ids: &[&str]) {
        let mut entries = self.entries.write().await;
        entries.retain(|id, _| ids.contains(&id.as_str()));
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
