//! Upstream order-book access.
//!
//! This module provides the abstraction over the third-party paginated
//! order-book API. New transports can be added by implementing
//! [`OrderBookApi`] without touching collection or reconciliation logic;
//! tests substitute mocks at the same seam.

pub mod cache;
pub mod fetcher;
pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Order, Side};

// Re-export commonly used types
pub use cache::FetchCache;
pub use fetcher::PageFetcher;
pub use http::HttpOrderBookApi;

/// Errors from a single upstream page fetch.
///
/// Derives `Clone` so one outcome can be fanned out to every caller
/// attached to a deduplicated in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, body read)
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Non-2xx, non-429 HTTP status
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    /// Response body was not a recognizable envelope
    #[error("malformed upstream envelope: {0}")]
    Envelope(String),

    /// The leader of a deduplicated request went away without reporting
    #[error("in-flight request abandoned")]
    Abandoned,
}

/// Result of one page fetch, before any collection policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// Parsed page with envelope metadata
    Page(PageEnvelope),
    /// Upstream answered 429; stands in for "empty page, zero total pages"
    RateLimited,
}

impl PageResult {
    /// Page count reported by the envelope; the sentinel reports zero.
    pub fn total_pages(&self) -> Option<u32> {
        match self {
            PageResult::Page(env) => env.total_pages,
            PageResult::RateLimited => Some(0),
        }
    }
}

/// One page of the order book as returned by the upstream envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageEnvelope {
    pub orders: Vec<RawOrder>,
    /// `totalPage` from the response; `None` when the field is missing,
    /// which the collector treats as a malformed side.
    pub total_pages: Option<u32>,
}

/// A single order record as found in the envelope, prior to coercion.
///
/// Upstream is loose about field names and types (numbers arrive as
/// strings or numbers, usernames may be absent), so everything except the
/// identity is optional here and normalized in [`RawOrder::into_order`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOrder {
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    pub price: Option<String>,
    pub quantity: Option<String>,
    pub funds: Option<String>,
}

impl RawOrder {
    /// Normalize into a domain [`Order`] tagged with `side`.
    ///
    /// Returns `None` only when the record has no usable external id.
    /// Numeric coercion policy: unparsable or missing decimals default to
    /// zero rather than failing the record.
    pub fn into_order(self, side: Side) -> Option<Order> {
        let external_id = self.external_id.filter(|id| !id.is_empty())?;
        Some(Order {
            external_id,
            side,
            display_name: self
                .display_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            price: coerce_decimal(self.price.as_deref()),
            quantity: coerce_decimal(self.quantity.as_deref()),
            funds: coerce_decimal(self.funds.as_deref()),
        })
    }
}

/// Parse a decimal field, defaulting to zero on missing or junk input.
pub(crate) fn coerce_decimal(raw: Option<&str>) -> Decimal {
    raw.and_then(|s| s.trim().parse::<Decimal>().ok())
        .unwrap_or(Decimal::ZERO)
}

/// Transport seam for fetching one raw page of one order-book side.
///
/// Implementations perform exactly one logical request; caching,
/// deduplication and retries live in [`PageFetcher`] on top of this trait.
#[async_trait]
pub trait OrderBookApi: Send + Sync {
    async fn fetch_page(&self, side: Side, page: u32) -> Result<PageResult, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_coerce_decimal_defaults_to_zero() {
        assert_eq!(coerce_decimal(Some("12.5")), dec!(12.5));
        assert_eq!(coerce_decimal(Some(" 3 ")), dec!(3));
        assert_eq!(coerce_decimal(Some("not-a-number")), Decimal::ZERO);
        assert_eq!(coerce_decimal(Some("")), Decimal::ZERO);
        assert_eq!(coerce_decimal(None), Decimal::ZERO);
    }

    #[test]
    fn test_into_order_defaults() {
        let raw = RawOrder {
            external_id: Some("ord-1".to_string()),
            display_name: None,
            price: Some("101.5".to_string()),
            quantity: Some("garbage".to_string()),
            funds: None,
        };

        let order = raw.into_order(Side::Buy).unwrap();
        assert_eq!(order.external_id, "ord-1");
        assert_eq!(order.display_name, "Unknown");
        assert_eq!(order.price, dec!(101.5));
        assert_eq!(order.quantity, Decimal::ZERO);
        assert_eq!(order.funds, Decimal::ZERO);
        assert_eq!(order.side, Side::Buy);
    }

    #[test]
    fn test_into_order_requires_identity() {
        assert!(RawOrder::default().into_order(Side::Sell).is_none());

        let blank_id = RawOrder {
            external_id: Some(String::new()),
            ..Default::default()
        };
        assert!(blank_id.into_order(Side::Sell).is_none());
    }

    #[test]
    fn test_sentinel_reports_zero_pages() {
        assert_eq!(PageResult::RateLimited.total_pages(), Some(0));

        let page = PageResult::Page(PageEnvelope {
            orders: vec![],
            total_pages: Some(4),
        });
        assert_eq!(page.total_pages(), Some(4));
    }
}
