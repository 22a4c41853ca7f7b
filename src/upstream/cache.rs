//! Short-lived page cache with in-flight request deduplication.
//!
//! Instance-scoped by design: constructed once and injected into the page
//! fetcher, never a module-level global, so concurrent runs share one cache
//! and tests get isolated instances.

use std::collections::HashMap;

use tokio::sync::{broadcast, Mutex};
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::{FetchError, PageResult};
use crate::types::Side;

/// Cache key: everything that varies between requests within a run.
pub type PageKey = (Side, u32);

/// What a leader ultimately reports for a page key.
pub type Outcome = Result<PageResult, FetchError>;

/// How a caller should proceed for a given page key.
pub enum Flight {
    /// A fresh cached result; no I/O needed.
    Cached(PageResult),
    /// Caller is the first in; it must fetch and then call [`FetchCache::complete`].
    Leader,
    /// Same request already outstanding; await the leader's outcome here.
    Follower(broadcast::Receiver<Outcome>),
}

struct CacheEntry {
    result: PageResult,
    fetched_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<PageKey, CacheEntry>,
    in_flight: HashMap<PageKey, broadcast::Sender<Outcome>>,
}

/// TTL cache plus in-flight map, guarded by a single lock so admission is
/// atomic with respect to both maps.
pub struct FetchCache {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Admit a caller for `key`: cached result, leadership, or followership.
    pub async fn begin(&self, key: PageKey) -> Flight {
        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.entries.get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(side = %key.0, page = key.1, "Page cache hit");
                return Flight::Cached(entry.result.clone());
            }
        }

        if let Some(sender) = inner.in_flight.get(&key) {
            debug!(side = %key.0, page = key.1, "Attaching to in-flight fetch");
            return Flight::Follower(sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        inner.in_flight.insert(key, sender);
        Flight::Leader
    }

    /// Report the leader's outcome: populates the cache on success, clears
    /// the in-flight marker either way (so later calls can retry after a
    /// failure), then wakes every follower with a clone of the outcome.
    pub async fn complete(&self, key: PageKey, outcome: Outcome) {
        let sender = {
            let mut inner = self.inner.lock().await;
            if let Ok(result) = &outcome {
                inner.entries.insert(
                    key,
                    CacheEntry {
                        result: result.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            let ttl = self.ttl;
            inner.entries.retain(|_, e| e.fetched_at.elapsed() < ttl);
            inner.in_flight.remove(&key)
        };

        if let Some(sender) = sender {
            // No receivers just means nobody attached; not an error.
            let _ = sender.send(outcome);
        }
    }

    /// Number of live (unexpired) cached pages.
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .entries
            .values()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::PageEnvelope;

    fn empty_page(total: u32) -> PageResult {
        PageResult::Page(PageEnvelope {
            orders: vec![],
            total_pages: Some(total),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_result_within_ttl() {
        let cache = FetchCache::new(Duration::from_secs(3));
        let key = (Side::Buy, 1);

        assert!(matches!(cache.begin(key).await, Flight::Leader));
        cache.complete(key, Ok(empty_page(2))).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        match cache.begin(key).await {
            Flight::Cached(result) => assert_eq!(result.total_pages(), Some(2)),
            _ => panic!("expected cache hit"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = FetchCache::new(Duration::from_secs(3));
        let key = (Side::Sell, 1);

        assert!(matches!(cache.begin(key).await, Flight::Leader));
        cache.complete(key, Ok(empty_page(1))).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(matches!(cache.begin(key).await, Flight::Leader));
        // Second leadership leaves an in-flight marker behind
        cache.complete(key, Ok(empty_page(1))).await;
    }

    #[tokio::test]
    async fn test_followers_receive_leader_outcome() {
        let cache = FetchCache::new(Duration::from_secs(3));
        let key = (Side::Buy, 2);

        assert!(matches!(cache.begin(key).await, Flight::Leader));
        let mut rx = match cache.begin(key).await {
            Flight::Follower(rx) => rx,
            _ => panic!("expected follower"),
        };

        cache.complete(key, Ok(empty_page(5))).await;
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.unwrap().total_pages(), Some(5));
    }

    #[tokio::test]
    async fn test_failure_clears_in_flight_without_caching() {
        let cache = FetchCache::new(Duration::from_secs(3));
        let key = (Side::Buy, 3);

        assert!(matches!(cache.begin(key).await, Flight::Leader));
        cache
            .complete(key, Err(FetchError::Status { status: 500 }))
            .await;

        assert!(cache.is_empty().await);
        // Next caller leads again rather than reading a cached failure
        assert!(matches!(cache.begin(key).await, Flight::Leader));
        cache.complete(key, Ok(empty_page(1))).await;
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_collide() {
        let cache = FetchCache::new(Duration::from_secs(3));

        assert!(matches!(cache.begin((Side::Buy, 1)).await, Flight::Leader));
        assert!(matches!(cache.begin((Side::Sell, 1)).await, Flight::Leader));
        assert!(matches!(cache.begin((Side::Buy, 2)).await, Flight::Leader));

        cache.complete((Side::Buy, 1), Ok(empty_page(1))).await;
        cache.complete((Side::Sell, 1), Ok(empty_page(1))).await;
        cache.complete((Side::Buy, 2), Ok(empty_page(1))).await;
        assert_eq!(cache.len().await, 3);
    }
}
