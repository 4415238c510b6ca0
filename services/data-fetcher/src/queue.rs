//! Media service queue contract
//!
//! The fetcher publishes branding assets (icons/logos) to the media service
//! over this capability interface and forgets them. Delivery and retry
//! semantics belong to the queue implementation, not to the fetcher.

use async_trait::async_trait;
use tokio::sync::Mutex;
use types::media::PutMessage;

use crate::error::QueueError;

/// Publish capability for media-storage messages.
#[async_trait]
pub trait MediaQueue: Send + Sync {
    async fn publish(&self, message: PutMessage) -> Result<(), QueueError>;
}

/// In-memory `MediaQueue` collecting published messages, for tests and local
/// runs.
#[derive(Default)]
pub struct MemoryQueue {
    messages: Mutex<Vec<PutMessage>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<PutMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl MediaQueue for MemoryQueue {
    async fn publish(&self, message: PutMessage) -> Result<(), QueueError> {
        self.messages.lock().await.push(message);
        Ok(())
    }
}
