//! End-to-end pipeline tests: mock upstream transport, in-memory store,
//! real fetcher/collector/reconciler in between.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use booksync::config::{FetcherConfig, PipelineConfig};
use booksync::pipeline::Pipeline;
use booksync::store::{MemoryOrderStore, OrderStore};
use booksync::types::{OrderStatus, RunSource, Side};
use booksync::upstream::{
    FetchCache, FetchError, OrderBookApi, PageEnvelope, PageFetcher, PageResult, RawOrder,
};

// --- Mock upstream ---

/// Scriptable upstream: pages per (side, page), swappable at runtime so a
/// test can change the book between runs.
struct ScriptedUpstream {
    pages: RwLock<HashMap<(Side, u32), PageResult>>,
    calls: AtomicU32,
}

impl ScriptedUpstream {
    fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    async fn set_side(&self, side: Side, orders: Vec<RawOrder>) {
        let mut pages = self.pages.write().await;
        pages.insert(
            (side, 1),
            PageResult::Page(PageEnvelope {
                orders,
                total_pages: Some(1),
            }),
        );
    }

    async fn set_rate_limited(&self, side: Side) {
        let mut pages = self.pages.write().await;
        pages.insert((side, 1), PageResult::RateLimited);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderBookApi for ScriptedUpstream {
    async fn fetch_page(&self, side: Side, page: u32) -> Result<PageResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().await;
        pages
            .get(&(side, page))
            .cloned()
            .ok_or(FetchError::Status { status: 500 })
    }
}

fn raw(id: &str, price: &str) -> RawOrder {
    RawOrder {
        external_id: Some(id.to_string()),
        display_name: Some("trader".to_string()),
        price: Some(price.to_string()),
        quantity: Some("1".to_string()),
        funds: Some(price.to_string()),
    }
}

fn build_pipeline(
    upstream: Arc<ScriptedUpstream>,
    store: Arc<MemoryOrderStore>,
) -> Pipeline<ScriptedUpstream> {
    let tuning = FetcherConfig::default();
    let fetcher = Arc::new(PageFetcher::new(
        upstream,
        Arc::new(FetchCache::new(tuning.cache_ttl)),
        tuning.retry,
    ));
    Pipeline::new(fetcher, store, PipelineConfig::default())
}

// --- Tests ---

#[tokio::test(start_paused = true)]
async fn full_cycle_open_close_reopen() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = build_pipeline(upstream.clone(), store.clone());

    // Run 1: order A appears on the buy side
    upstream.set_side(Side::Buy, vec![raw("A", "10")]).await;
    upstream.set_side(Side::Sell, vec![]).await;

    let summary = pipeline.run(RunSource::Manual).await;
    assert!(summary.success);
    assert_eq!(summary.saved_to_database, 1);
    assert_eq!(summary.closed_orders, 0);

    let a = store.list_all().await.unwrap().remove(0);
    assert_eq!(a.status, OrderStatus::Open);
    let created_at = a.created_at;

    // Run 2: A disappears
    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    upstream.set_side(Side::Buy, vec![]).await;

    let summary = pipeline.run(RunSource::Scheduled).await;
    assert!(summary.success);
    assert_eq!(summary.closed_orders, 1);
    assert_eq!(summary.rate_limited, Some(true));
    assert_eq!(
        store.list_all().await.unwrap()[0].status,
        OrderStatus::Close
    );

    // Run 3: A reappears at a new price and reopens, created_at untouched
    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    upstream.set_side(Side::Buy, vec![raw("A", "12")]).await;

    let summary = pipeline.run(RunSource::Scheduled).await;
    assert_eq!(summary.saved_to_database, 1);
    assert_eq!(summary.closed_orders, 0);

    let a = store.list_all().await.unwrap().remove(0);
    assert_eq!(a.status, OrderStatus::Open);
    assert_eq!(a.price, dec!(12));
    assert_eq!(a.created_at, created_at);
}

#[tokio::test(start_paused = true)]
async fn fresh_buy_order_replaces_persisted_open_order() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = build_pipeline(upstream.clone(), store.clone());

    // Seed persisted open order B via a first run
    upstream.set_side(Side::Buy, vec![raw("B", "1")]).await;
    upstream.set_side(Side::Sell, vec![]).await;
    pipeline.run(RunSource::Manual).await;

    // Fresh fetch: buy=[A], sell=[]
    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    upstream.set_side(Side::Buy, vec![raw("A", "2")]).await;

    let summary = pipeline.run(RunSource::Manual).await;
    assert_eq!(summary.closed_orders, 1);
    assert_eq!(summary.saved_to_database, 1);
    assert_eq!(summary.total_entries, 1);

    let all = store.list_all().await.unwrap();
    let b = all.iter().find(|o| o.external_id == "B").unwrap();
    assert_eq!(b.status, OrderStatus::Close);
    let a = all.iter().find(|o| o.external_id == "A").unwrap();
    assert_eq!(a.status, OrderStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn both_sides_rate_limited_close_existing_open_orders() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = build_pipeline(upstream.clone(), store.clone());

    upstream.set_side(Side::Buy, vec![raw("A", "3")]).await;
    upstream.set_side(Side::Sell, vec![raw("S", "4")]).await;
    pipeline.run(RunSource::Manual).await;

    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    upstream.set_rate_limited(Side::Buy).await;
    upstream.set_rate_limited(Side::Sell).await;

    let summary = pipeline.run(RunSource::Scheduled).await;
    assert!(summary.success);
    assert_eq!(summary.rate_limited, Some(true));
    assert_eq!(summary.saved_to_database, 0);
    // The empty fresh set closes every previously open order
    assert_eq!(summary.closed_orders, 2);
    for order in store.list_all().await.unwrap() {
        assert_eq!(order.status, OrderStatus::Close);
    }
}

#[tokio::test(start_paused = true)]
async fn non_numeric_price_persists_as_zero() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = build_pipeline(upstream.clone(), store.clone());

    let mut bad = raw("A", "10");
    bad.price = Some("not-a-price".to_string());
    upstream.set_side(Side::Buy, vec![bad]).await;
    upstream.set_side(Side::Sell, vec![]).await;

    let summary = pipeline.run(RunSource::Manual).await;
    assert_eq!(summary.saved_to_database, 1);

    let a = store.list_all().await.unwrap().remove(0);
    assert_eq!(a.price, Decimal::ZERO);
    assert_eq!(a.quantity, dec!(1));
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_within_cache_ttl_share_upstream_requests() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = build_pipeline(upstream.clone(), store.clone());

    upstream.set_side(Side::Buy, vec![raw("A", "1")]).await;
    upstream.set_side(Side::Sell, vec![]).await;

    pipeline.run(RunSource::Manual).await;
    let after_first = upstream.calls();
    assert_eq!(after_first, 2);

    // Second run inside the 3s TTL is served entirely from cache
    pipeline.run(RunSource::Manual).await;
    assert_eq!(upstream.calls(), after_first);
}

#[tokio::test(start_paused = true)]
async fn concurrent_manual_and_scheduled_runs_converge() {
    let upstream = Arc::new(ScriptedUpstream::new());
    let store = Arc::new(MemoryOrderStore::new());
    let pipeline = Arc::new(build_pipeline(upstream.clone(), store.clone()));

    upstream.set_side(Side::Buy, vec![raw("A", "5")]).await;
    upstream.set_side(Side::Sell, vec![]).await;

    let (manual, scheduled) = tokio::join!(
        pipeline.run(RunSource::Manual),
        pipeline.run(RunSource::Scheduled)
    );

    assert!(manual.success && scheduled.success);
    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, OrderStatus::Open);
}
