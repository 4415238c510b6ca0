//! Resumable request cursor
//!
//! Remembers the last outstanding request URL for one fetch class and whether
//! it has already been consumed. Persisting the exact URL, not just a cursor
//! token, keeps resumption correct even when the upstream encodes sort order
//! or filters into its opaque next-page URLs.

/// Consume-once memory of the last outstanding request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCursor {
    request_url: String,
    used: bool,
}

impl RequestCursor {
    /// Resolve the next request URL.
    ///
    /// If an unused URL was restored from persisted state, return it verbatim;
    /// otherwise invoke `build` for a fresh URL. Either way the URL is marked
    /// consumed and remembered for the next state snapshot, so a later resolve
    /// builds again instead of replaying it.
    pub fn resolve<F>(&mut self, build: F) -> String
    where
        F: FnOnce() -> String,
    {
        if !self.used && !self.request_url.is_empty() {
            self.used = true;
            return self.request_url.clone();
        }
        let url = build();
        self.request_url = url.clone();
        self.used = true;
        url
    }

    /// Restore a URL from persisted state, making it eligible for exactly one
    /// `resolve` without a builder call.
    pub fn restore(&mut self, url: &str) {
        self.request_url = url.trim().to_string();
        self.used = false;
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn is_used(&self) -> bool {
        self.used
    }
}
