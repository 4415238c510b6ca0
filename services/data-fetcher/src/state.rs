//! Fetch state machine
//!
//! Owns the cursor set, the coarse fetch mode, and the recently-completed
//! guard. The state is exclusively owned by the fetch loop for the process
//! lifetime; there is no concurrent mutation, so no locking.

use chrono::{DateTime, Utc};
use tracing::info;
use types::fetch::FetcherState as FetcherStateRecord;

use crate::cursor::RequestCursor;

/// Coarse ingestion mode: long historical backfill vs short recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Historical backfill over `mode_total_hours`
    Total,
    /// Steady-state incremental window over `mode_current_hours`
    Current,
}

/// In-process fetch state: mode latch, completion guard, resumable cursors.
#[derive(Debug)]
pub struct FetchState {
    finished: bool,
    updated_at: Option<DateTime<Utc>>,
    mode: FetchMode,
    mode_total_hours: i64,
    mode_current_hours: i64,
    /// One-way latch: set on the first successful full pass, never cleared
    switched_to_current: bool,
    recently_threshold: chrono::Duration,

    pub ticker: RequestCursor,
    pub ticker_details: RequestCursor,
    pub stocks: RequestCursor,
}

impl FetchState {
    pub fn new(
        mode_total_hours: i64,
        mode_current_hours: i64,
        recently_threshold: chrono::Duration,
    ) -> Self {
        Self {
            finished: false,
            updated_at: None,
            mode: FetchMode::Total,
            mode_total_hours,
            mode_current_hours,
            switched_to_current: false,
            recently_threshold,
            ticker: RequestCursor::default(),
            ticker_details: RequestCursor::default(),
            stocks: RequestCursor::default(),
        }
    }

    pub fn set_mode(&mut self, mode: FetchMode) {
        self.mode = mode;
        info!(?mode, "fetcher mode set");
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn reset_finished(&mut self) {
        self.finished = false;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// True iff a full pass completed within the recently threshold; the loop
    /// sleeps instead of hammering the upstream again.
    pub fn has_recently_fetched(&self, now: DateTime<Utc>) -> bool {
        if !self.finished {
            return false;
        }
        match self.updated_at {
            Some(updated_at) => now < updated_at + self.recently_threshold,
            None => false,
        }
    }

    /// Flip `Total -> Current` exactly once per process lifetime. Later calls
    /// are no-ops.
    pub fn latch_current(&mut self) {
        if self.switched_to_current {
            return;
        }
        self.switched_to_current = true;
        self.set_mode(FetchMode::Current);
    }

    /// Ingestion window for the active mode, in hours.
    pub fn window_hours(&self) -> i64 {
        match self.mode {
            FetchMode::Total => self.mode_total_hours,
            FetchMode::Current => self.mode_current_hours,
        }
    }

    /// Snapshot for persistence.
    pub fn to_record(&self, now: DateTime<Utc>) -> FetcherStateRecord {
        FetcherStateRecord {
            ticker_req_url: self.ticker.request_url().trim().to_string(),
            ticker_details_req_url: self.ticker_details.request_url().trim().to_string(),
            stock_req_url: self.stocks.request_url().trim().to_string(),
            finished: self.finished,
            created_at: Some(now),
        }
    }

    /// Rebuild resumable fields from a persisted snapshot. Restored URLs are
    /// each eligible for exactly one verbatim reuse.
    pub fn restore(&mut self, record: &FetcherStateRecord) {
        self.ticker.restore(&record.ticker_req_url);
        self.ticker_details.restore(&record.ticker_details_req_url);
        self.stocks.restore(&record.stock_req_url);
        self.finished = record.finished;
        self.updated_at = record.created_at;
    }
}
