//! Data Fetcher Service
//!
//! Continuously pulls the upstream market-data API and ingests:
//! - The active ticker universe (paginated listing)
//! - Per-ticker company details, with branding images forwarded to the
//!   media queue
//! - Daily aggregate price bars over a historical or incremental window
//!
//! # Architecture
//!
//! ```text
//!  Upstream API
//!       │
//!  ┌────▼─────┐
//!  │ Client   │  ← token-bucket limiter, retries, credential injection
//!  └────┬─────┘
//!       │
//!  ┌────▼─────┐
//!  │ Pipeline │  ← tickers → details → bars, cursor-resumable
//!  └──┬────┬──┘
//!     │    │
//! ┌───▼──┐ └───► MediaQueue (branding images)
//! │Store │
//! └──────┘
//! ```
//!
//! The fetch loop runs one full pass at a time, backs off on failure, and
//! persists its cursors so a restart resumes mid-pagination instead of
//! starting over.

pub mod api;
pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod queue;
pub mod state;
pub mod storage;
