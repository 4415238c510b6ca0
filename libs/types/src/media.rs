//! Media queue message types
//!
//! Branding assets (ticker icons and logos) are never persisted by the
//! fetcher itself; they are published to the media service queue and
//! forgotten.

use serde::{Deserialize, Serialize};

/// A request to store one media object, published to the media service queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutMessage {
    pub meta: PutMessageMeta,
    /// Raw object bytes
    pub content: Vec<u8>,
}

/// Metadata accompanying a media object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutMessageMeta {
    /// Object name, e.g. `AAPL-icon.png`
    pub name: String,
    /// Target storage section
    pub section: String,
    /// Whether an existing object with the same name may be replaced
    #[serde(default)]
    pub overwrite: bool,
    /// Originating service tag
    pub from: String,
    /// Unix timestamp (seconds) of the publish
    pub timestamp: i64,
}
