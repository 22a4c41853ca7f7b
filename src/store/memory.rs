//! In-memory order store.
//!
//! Backs runs without a configured database and doubles as the test
//! double for the pipeline. Mirrors the relational semantics exactly:
//! upsert keyed by `external_id`, surrogate ids, `created_at` preserved
//! across upserts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{OrderStore, StoreError};
use crate::types::{Order, OrderStatus, PersistedOrder};

pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, PersistedOrder>>,
    next_id: AtomicI64,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed the store with an existing row (tests and tooling).
    pub async fn insert_persisted(&self, order: PersistedOrder) {
        let mut orders = self.orders.write().await;
        self.next_id.fetch_max(order.id + 1, Ordering::SeqCst);
        orders.insert(order.external_id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut orders = self.orders.write().await;

        match orders.get_mut(&order.external_id) {
            Some(existing) => {
                existing.side = order.side;
                existing.display_name = order.display_name.clone();
                existing.price = order.price;
                existing.quantity = order.quantity;
                existing.funds = order.funds;
                existing.status = OrderStatus::Open;
                existing.updated_at = now;
                // created_at untouched
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                orders.insert(
                    order.external_id.clone(),
                    PersistedOrder {
                        id,
                        external_id: order.external_id.clone(),
                        side: order.side,
                        display_name: order.display_name.clone(),
                        price: order.price,
                        quantity: order.quantity,
                        funds: order.funds,
                        status: OrderStatus::Open,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn set_status(&self, external_id: &str, status: OrderStatus) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(external_id) {
            Some(existing) => {
                existing.status = status;
                existing.updated_at = Utc::now();
            }
            None => {
                debug!(external_id, "set_status for unknown order, ignoring");
            }
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PersistedOrder>, StoreError> {
        let orders = self.orders.read().await;
        let mut all: Vec<PersistedOrder> = orders.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::types::Side;

    fn order(id: &str, price: rust_decimal::Decimal) -> Order {
        Order {
            external_id: id.to_string(),
            side: Side::Buy,
            display_name: "alice".to_string(),
            price,
            quantity: dec!(1),
            funds: price,
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_open_order() {
        let store = MemoryOrderStore::new();
        store.upsert(&order("a", dec!(10))).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].external_id, "a");
        assert_eq!(all[0].status, OrderStatus::Open);
        assert_eq!(all[0].price, dec!(10));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_but_preserves_created_at() {
        let store = MemoryOrderStore::new();
        store.upsert(&order("a", dec!(10))).await.unwrap();
        let created_at = store.list_all().await.unwrap()[0].created_at;
        let first_id = store.list_all().await.unwrap()[0].id;

        store.upsert(&order("a", dec!(12))).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].price, dec!(12));
        assert_eq!(all[0].created_at, created_at);
        assert_eq!(all[0].id, first_id);
        assert!(all[0].updated_at >= created_at);
    }

    #[tokio::test]
    async fn test_reupsert_reopens_closed_order() {
        let store = MemoryOrderStore::new();
        store.upsert(&order("a", dec!(10))).await.unwrap();
        store.set_status("a", OrderStatus::Close).await.unwrap();
        assert_eq!(store.list_all().await.unwrap()[0].status, OrderStatus::Close);

        store.upsert(&order("a", dec!(10))).await.unwrap();
        assert_eq!(store.list_all().await.unwrap()[0].status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_set_status_unknown_id_is_noop() {
        let store = MemoryOrderStore::new();
        store.set_status("ghost", OrderStatus::Close).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_creation() {
        let store = MemoryOrderStore::new();
        store.upsert(&order("a", dec!(1))).await.unwrap();
        store.upsert(&order("b", dec!(2))).await.unwrap();
        store.upsert(&order("c", dec!(3))).await.unwrap();
        // Re-upserting the first must not move it
        store.upsert(&order("a", dec!(4))).await.unwrap();

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.external_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
