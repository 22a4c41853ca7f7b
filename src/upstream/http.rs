//! HTTP transport for the upstream order-book API.
//!
//! One POST per page against a fixed endpoint. HTTP 429 is a recognized,
//! non-fatal response and is normalized to [`PageResult::RateLimited`];
//! everything else non-2xx is a [`FetchError`] for the retry layer.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{FetchError, OrderBookApi, PageEnvelope, PageResult, RawOrder};
use crate::config::UpstreamConfig;
use crate::types::Side;

/// Field names under which upstream has been observed to nest the order
/// array. Checked in order; first array wins.
const ORDER_ARRAY_KEYS: [&str; 4] = ["items", "list", "orders", "datas"];

/// Request body for one page of one side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageRequest<'a> {
    current_page: u32,
    page_size: u32,
    delivery_currency: &'a str,
    own_order: bool,
    side: &'a str,
}

/// `reqwest`-backed implementation of [`OrderBookApi`].
#[derive(Clone)]
pub struct HttpOrderBookApi {
    http: Client,
    config: UpstreamConfig,
}

impl HttpOrderBookApi {
    pub fn new(config: UpstreamConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl OrderBookApi for HttpOrderBookApi {
    async fn fetch_page(&self, side: Side, page: u32) -> Result<PageResult, FetchError> {
        let body = PageRequest {
            current_page: page,
            page_size: self.config.page_size,
            delivery_currency: &self.config.delivery_currency,
            own_order: false,
            side: side.as_str(),
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!(side = %side, page, "Upstream rate limited (429)");
            return Ok(PageResult::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Envelope(e.to_string()))?;

        let envelope = parse_envelope(&value);
        debug!(
            side = %side,
            page,
            orders = envelope.orders.len(),
            total_pages = ?envelope.total_pages,
            "Fetched upstream page"
        );
        Ok(PageResult::Page(envelope))
    }
}

/// Parse the response envelope. The payload sometimes sits at the root and
/// sometimes under a `data` wrapper; the order array moves between a few
/// field names. A missing `totalPage` is preserved as `None` so the
/// collector can fail the side with a descriptive error.
pub(crate) fn parse_envelope(value: &Value) -> PageEnvelope {
    let root = value.get("data").filter(|d| d.is_object()).unwrap_or(value);

    let total_pages = root
        .get("totalPage")
        .and_then(|v| coerce_u32(v));

    let orders = ORDER_ARRAY_KEYS
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_array))
        .map(|entries| entries.iter().map(parse_raw_order).collect())
        .unwrap_or_default();

    PageEnvelope {
        orders,
        total_pages,
    }
}

fn parse_raw_order(entry: &Value) -> RawOrder {
    RawOrder {
        external_id: first_string(entry, &["id", "orderId", "orderNo"]),
        display_name: first_string(entry, &["nickName", "nickname", "userName", "displayName"]),
        price: first_string(entry, &["price"]),
        quantity: first_string(entry, &["quantity", "amount", "size"]),
        funds: first_string(entry, &["funds", "volume", "total"]),
    }
}

/// First present field rendered as a string; numbers are stringified so
/// the decimal coercion downstream sees one shape.
fn first_string(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match entry.get(*key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn coerce_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
