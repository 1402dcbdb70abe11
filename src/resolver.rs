//! Stream resolution collaborator
//!
//! Turning a track id into a playable URL is network work owned by the
//! host (its API client knows about signing, regions, and retries). The
//! controller only consumes the result.

use anyhow::Result;
use async_trait::async_trait;

/// Resolves a track id to a playable stream URL
///
/// Implementations may take arbitrarily long; the controller calls this
/// off its serialized core and treats failures per track, never letting
/// one bad resolution block the rest of a queue.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, track_id: &str) -> Result<String>;
}
