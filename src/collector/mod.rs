//! Side collection: drive the page fetcher across one order-book side.
//!
//! A side never fails the run. Rate limits, malformed envelopes, page
//! failures and the collection deadline all degrade to "fewer orders from
//! this side", logged and carried on.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::types::{Order, Side};
use crate::upstream::{OrderBookApi, PageEnvelope, PageFetcher, PageResult};

/// Everything one side contributed to a run.
#[derive(Debug, Clone, Default)]
pub struct SideCollection {
    pub orders: Vec<Order>,
    pub total_pages: u32,
}

pub struct SideCollector<A> {
    fetcher: Arc<PageFetcher<A>>,
}

impl<A: OrderBookApi> SideCollector<A> {
    pub fn new(fetcher: Arc<PageFetcher<A>>) -> Self {
        Self { fetcher }
    }

    /// Collect all pages of `side`, stopping early at `deadline`.
    ///
    /// Page 1 discovers the page count from the envelope. A rate-limit
    /// sentinel contributes zero orders without error; a missing page
    /// count fails the side with zero orders; a failure mid-collection
    /// keeps the prefix collected so far. The deadline is cooperative:
    /// no new page fetch starts after it elapses.
    pub async fn collect(&self, side: Side, deadline: Instant) -> SideCollection {
        let mut collection = SideCollection::default();

        let first = match self.fetcher.fetch(side, 1).await {
            Ok(result) => result,
            Err(e) => {
                error!(side = %side, error = %e, "First page failed, side contributes no orders");
                return collection;
            }
        };

        let envelope = match first {
            PageResult::RateLimited => {
                info!(side = %side, "Upstream rate limited, skipping side this run");
                return collection;
            }
            PageResult::Page(envelope) => envelope,
        };

        let total_pages = match envelope.total_pages {
            Some(total) => total,
            None => {
                error!(side = %side, "Envelope missing totalPage, side contributes no orders");
                return collection;
            }
        };

        collection.total_pages = total_pages;
        self.append(&mut collection, side, envelope);

        for page in 2..=total_pages {
            if Instant::now() >= deadline {
                warn!(
                    side = %side,
                    next_page = page,
                    total_pages,
                    collected = collection.orders.len(),
                    "Collection deadline reached, proceeding with partial side"
                );
                break;
            }

            match self.fetcher.fetch(side, page).await {
                Ok(PageResult::Page(envelope)) => self.append(&mut collection, side, envelope),
                Ok(PageResult::RateLimited) => {
                    warn!(side = %side, page, "Rate limited mid-collection, keeping partial side");
                    break;
                }
                Err(e) => {
                    warn!(
                        side = %side,
                        page,
                        error = %e,
                        collected = collection.orders.len(),
                        "Page failed, keeping partial side"
                    );
                    break;
                }
            }
        }

        debug!(
            side = %side,
            orders = collection.orders.len(),
            total_pages = collection.total_pages,
            "Side collection finished"
        );
        collection
    }

    fn append(&self, collection: &mut SideCollection, side: Side, envelope: PageEnvelope) {
        for raw in envelope.orders {
            match raw.into_order(side) {
                Some(order) => collection.orders.push(order),
                None => warn!(side = %side, "Dropping order record without external id"),
            }
        }
    }
}
