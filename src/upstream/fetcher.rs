//! Page fetcher: cache, deduplication and retry over the raw transport.
//!
//! The single entry point for upstream I/O. Callers never talk to the
//! transport directly; every page request goes through the TTL cache, the
//! in-flight map and the shared retry policy, in that order.

use std::sync::Arc;

use tracing::debug;

use super::cache::{FetchCache, Flight};
use super::{FetchError, OrderBookApi, PageResult};
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::types::Side;

pub struct PageFetcher<A> {
    api: Arc<A>,
    cache: Arc<FetchCache>,
    retry: RetryPolicy,
}

impl<A: OrderBookApi> PageFetcher<A> {
    pub fn new(api: Arc<A>, cache: Arc<FetchCache>, retry: RetryPolicy) -> Self {
        Self { api, cache, retry }
    }

    /// Fetch one page of one side.
    ///
    /// Cache hits and attached in-flight requests issue no I/O. A 429 from
    /// the transport arrives here as `Ok(PageResult::RateLimited)` and is
    /// cached like any other result, so a burst of calls during a
    /// rate-limit window stays quiet. Errors are returned only after the
    /// retry policy is exhausted.
    pub async fn fetch(&self, side: Side, page: u32) -> Result<PageResult, FetchError> {
        let key = (side, page);

        match self.cache.begin(key).await {
            Flight::Cached(result) => Ok(result),
            Flight::Follower(mut rx) => match rx.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::Abandoned),
            },
            Flight::Leader => {
                debug!(side = %side, page, "Issuing upstream fetch");
                let outcome = retry_with_backoff(
                    self.retry,
                    || self.api.fetch_page(side, page),
                    // 429 was already normalized to a sentinel; anything
                    // surfacing as an error here is worth another attempt.
                    |_| true,
                )
                .await;
                self.cache.complete(key, outcome.clone()).await;
                outcome
            }
        }
    }
}
