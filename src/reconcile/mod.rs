//! Set reconciliation between the fresh fetch and the persisted book.
//!
//! Planning is a pure diff; application goes through the store with
//! per-record error isolation so one bad row never sinks the batch.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::OrderStore;
use crate::types::{Order, OrderStatus, PersistedOrder};

/// The minimal write set for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// External ids of persisted orders absent from the fresh fetch.
    pub to_close: Vec<String>,
    /// Every freshly fetched order; upserting is what reopens closed ones.
    pub to_upsert: Vec<Order>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_close.is_empty() && self.to_upsert.is_empty()
    }
}

/// Diff the fresh order set against the persisted set.
///
/// Closure is keyed purely on absence: any persisted `external_id` not in
/// the fresh set is scheduled for close regardless of its current status
/// (reclosing a closed order is a harmless no-op at the store). Every
/// fresh order is scheduled for upsert unconditionally.
pub fn plan(fresh: &[Order], persisted: &[PersistedOrder]) -> ReconcilePlan {
    let fresh_ids: HashSet<&str> = fresh.iter().map(|o| o.external_id.as_str()).collect();

    let to_close = persisted
        .iter()
        .filter(|p| !fresh_ids.contains(p.external_id.as_str()))
        .map(|p| p.external_id.clone())
        .collect();

    ReconcilePlan {
        to_close,
        to_upsert: fresh.to_vec(),
    }
}

/// Counts of writes that actually landed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub closed: usize,
    pub saved: usize,
}

/// Applies a [`ReconcilePlan`] against the injected store.
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Apply closes first, then upserts.
    ///
    /// Each record is its own failure domain: a store error is logged and
    /// the record skipped (not counted), the rest of the batch proceeds.
    pub async fn apply(&self, plan: &ReconcilePlan) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for external_id in &plan.to_close {
            match self.store.set_status(external_id, OrderStatus::Close).await {
                Ok(()) => outcome.closed += 1,
                Err(e) => {
                    warn!(external_id = %external_id, error = %e, "Failed to close order, skipping");
                }
            }
        }

        for order in &plan.to_upsert {
            match self.store.upsert(order).await {
                Ok(()) => outcome.saved += 1,
                Err(e) => {
                    warn!(
                        external_id = %order.external_id,
                        error = %e,
                        "Failed to upsert order, skipping"
                    );
                }
            }
        }

        debug!(
            closed = outcome.closed,
            saved = outcome.saved,
            "Reconciliation plan applied"
        );
        outcome
    }
}
