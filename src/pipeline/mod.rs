//! Run orchestration: both sides, one reconciliation, one summary.
//!
//! `run()` never lets an error escape; callers always receive a structured
//! [`RunSummary`]. Failures are contained at the smallest scope that
//! preserves partial progress: record, then side, then run — only
//! schema/connectivity failures fail the run.

pub mod scheduler;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::collector::SideCollector;
use crate::config::PipelineConfig;
use crate::reconcile::{self, Reconciler};
use crate::store::OrderStore;
use crate::types::{RunSource, Side};
use crate::upstream::{OrderBookApi, PageFetcher};

/// Structured result of one pipeline run, as surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: bool,
    pub message: String,
    pub total_buy_orders: usize,
    pub total_sell_orders: usize,
    pub total_entries: usize,
    pub saved_to_database: usize,
    pub closed_orders: usize,
    pub source: RunSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

impl RunSummary {
    fn failed(source: RunSource, message: String) -> Self {
        Self {
            success: false,
            message,
            total_buy_orders: 0,
            total_sell_orders: 0,
            total_entries: 0,
            saved_to_database: 0,
            closed_orders: 0,
            source,
            rate_limited: None,
        }
    }
}

/// Orchestrates one fetch-reconcile-persist cycle.
pub struct Pipeline<A> {
    collector: SideCollector<A>,
    reconciler: Reconciler,
    store: Arc<dyn OrderStore>,
    config: PipelineConfig,
    /// Serializes overlapping runs (manual trigger racing the scheduler)
    /// to avoid redundant upstream load. Correctness does not depend on
    /// it: concurrent upserts converge last-writer-wins at the store.
    run_lock: Mutex<()>,
}

impl<A: OrderBookApi> Pipeline<A> {
    pub fn new(
        fetcher: Arc<PageFetcher<A>>,
        store: Arc<dyn OrderStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            collector: SideCollector::new(fetcher),
            reconciler: Reconciler::new(store.clone()),
            store,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Run the full pipeline once.
    ///
    /// Collects buy and sell concurrently under a shared deadline, diffs
    /// against the persisted set and applies closes then upserts. Always
    /// returns a summary, never an error.
    pub async fn run(&self, source: RunSource) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id, source = %source);
        self.run_inner(source).instrument(span).await
    }

    async fn run_inner(&self, source: RunSource) -> RunSummary {
        let _guard = self.run_lock.lock().await;

        if let Err(e) = self.store.ensure_schema().await {
            error!(error = %e, "Schema initialization failed, aborting run");
            return RunSummary::failed(source, format!("schema initialization failed: {}", e));
        }

        // Both sides share one deadline; each stops starting new pages
        // once it elapses and the run proceeds with what was collected.
        let deadline = Instant::now() + self.config.collection_timeout;
        let (buy, sell) = tokio::join!(
            self.collector.collect(Side::Buy, deadline),
            self.collector.collect(Side::Sell, deadline)
        );

        let total_buy_orders = buy.orders.len();
        let total_sell_orders = sell.orders.len();
        let rate_limited = total_buy_orders == 0 && total_sell_orders == 0;

        let mut fresh = buy.orders;
        fresh.extend(sell.orders);
        let total_entries = fresh.len();

        // Read-before-write: one snapshot of the persisted set per run.
        let persisted = match self.store.list_all().await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(error = %e, "Failed to read persisted orders, aborting run");
                return RunSummary::failed(source, format!("failed to read persisted orders: {}", e));
            }
        };

        let plan = reconcile::plan(&fresh, &persisted);
        let outcome = self.reconciler.apply(&plan).await;

        info!(
            total_buy_orders,
            total_sell_orders,
            saved = outcome.saved,
            closed = outcome.closed,
            rate_limited,
            "Run complete"
        );

        RunSummary {
            success: true,
            message: "order book synchronized".to_string(),
            total_buy_orders,
            total_sell_orders,
            total_entries,
            saved_to_database: outcome.saved,
            closed_orders: outcome.closed,
            source,
            rate_limited: rate_limited.then_some(true),
        }
    }
}
