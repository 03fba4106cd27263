//! Search-area recency tracking.
//!
//! Every discovery pass records the (lat, lng, radius, sport) tuple it
//! covered. Fresh tuples short-circuit repeat jobs, frequently searched
//! coordinates feed the popular-areas refresh, and tuples untouched for
//! months get purged.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};

use courtscout_common::{PopularArea, SearchArea, SearchAreaKey};

use crate::traits::SearchAreaStore;

/// A tuple searched within this many days is fresh and skipped.
pub const DEFAULT_FRESH_WINDOW_DAYS: i64 = 7;
/// Lookback window for the popular-areas query.
pub const POPULAR_SINCE_DAYS: i64 = 30;
/// Minimum searches for a coordinate to count as popular.
pub const POPULAR_MIN_SEARCHES: i64 = 1;
/// Cap on the popular-areas result set.
pub const POPULAR_LIMIT: i64 = 20;
/// Tuples untouched this long are purged by the weekly sweep.
pub const STALE_AFTER_DAYS: i64 = 90;

pub struct SearchAreaTracker {
    store: Arc<dyn SearchAreaStore>,
}

impl SearchAreaTracker {
    pub fn new(store: Arc<dyn SearchAreaStore>) -> Self {
        Self { store }
    }

    /// Pure timestamp check: was this exact tuple completed or started
    /// within the window? Two jobs checking before either records will
    /// both proceed; the dedup layer absorbs the duplicate results.
    pub async fn is_fresh(&self, key: &SearchAreaKey, within: Duration) -> Result<bool> {
        let area = self.store.find_by_key(key).await?;
        Ok(match area {
            Some(area) => Utc::now() - area.last_discovered_at < within,
            None => false,
        })
    }

    pub async fn cached(&self, key: &SearchAreaKey) -> Result<Option<SearchArea>> {
        self.store.find_by_key(key).await
    }

    /// Stamp the tuple before the pass runs, so a crash mid-pass still
    /// dampens immediate retries of the same area.
    pub async fn record_in_progress(&self, key: &SearchAreaKey) -> Result<()> {
        self.store.touch(key, Utc::now()).await
    }

    /// Stamp the tuple with its final result count. Called on success and,
    /// best-effort with a zero count, on failure.
    pub async fn record_completion(&self, key: &SearchAreaKey, total_found: i32) -> Result<()> {
        self.store.complete(key, total_found, Utc::now()).await
    }

    /// Coordinates searched at least `min_searches` times in the lookback
    /// window, most-searched first.
    pub async fn popular_areas(
        &self,
        since_days: i64,
        min_searches: i64,
        limit: i64,
    ) -> Result<Vec<PopularArea>> {
        let since = Utc::now() - Duration::days(since_days);
        self.store.popular(since, min_searches, limit).await
    }

    /// Drop tuples untouched for `older_than_days`. Returns rows removed.
    pub async fn purge_stale(&self, older_than_days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(older_than_days);
        self.store.delete_stale(cutoff).await
    }

    pub fn default_fresh_window() -> Duration {
        Duration::days(DEFAULT_FRESH_WINDOW_DAYS)
    }
}
