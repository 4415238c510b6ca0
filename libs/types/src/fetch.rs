//! Persisted fetcher state record
//!
//! The continuous fetcher periodically persists the exact request URLs it was
//! working through so that a restart resumes mid-fetch instead of starting
//! over. Only the URLs, the finished flag, and the save time are persisted;
//! in-process bookkeeping (consume-once flags, mode latch) is rebuilt on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the fetcher's resumable state, as stored by the Storage
/// collaborator and reloaded on startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetcherState {
    /// Last outstanding ticker-list page URL (empty if none)
    pub ticker_req_url: String,
    /// Last outstanding ticker-details URL (empty if none)
    pub ticker_details_req_url: String,
    /// Last outstanding stock-bars URL (empty if none)
    pub stock_req_url: String,
    /// Whether the last full pass completed
    pub finished: bool,
    /// When this snapshot was taken
    pub created_at: Option<DateTime<Utc>>,
}
