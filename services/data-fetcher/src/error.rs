//! Error taxonomy for the fetcher
//!
//! Two layers: `ClientError` covers a single outbound HTTP call and knows
//! whether the failure is worth retrying; `FetchError` covers a whole fetch
//! pass and is what the continuous loop's retry budget counts.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound HTTP call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("bad response status code: {code}")]
    Status { code: u16 },

    #[error("rate limiter deadline {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl ClientError {
    /// Transport failures, 5xx responses, and limiter deadlines are worth
    /// re-issuing; a 4xx is a hard failure of the current call.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { code } => *code >= 500,
            ClientError::DeadlineExceeded(_) => true,
        }
    }
}

/// Failure of a storage operation.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Failure of a queue publish.
#[derive(Debug, Error)]
#[error("queue error: {0}")]
pub struct QueueError(pub String);

/// Failure of a fetch pass. The continuous loop treats every variant the
/// same way: back off and retry the whole pass until the budget runs out.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("bad api response status: {0}")]
    BadStatus(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),

    #[error("fetching failed after {attempts} attempts and stopped")]
    RetriesExhausted { attempts: u32 },
}
