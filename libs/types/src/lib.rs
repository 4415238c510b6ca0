//! Types library for the stock market data platform
//!
//! This library provides the domain type definitions shared across the
//! platform services (data fetcher, client API, media pipeline).
//!
//! # Modules
//! - `ticker`: Ticker and company metadata types
//! - `stock`: Price bar (OHLCV) types
//! - `fetch`: Persisted fetcher state record
//! - `media`: Media queue message types

// Public modules
pub mod fetch;
pub mod media;
pub mod stock;
pub mod ticker;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fetch::*;
    pub use crate::media::*;
    pub use crate::stock::*;
    pub use crate::ticker::*;
}
