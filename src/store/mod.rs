//! Durable order persistence.
//!
//! The store is the sole arbiter of durable state: keyed by upstream
//! `external_id`, no hard delete, closed orders retained indefinitely.
//! Backends implement [`OrderStore`]; the pipeline is written against the
//! trait only.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Order, OrderStatus, PersistedOrder};

// Re-export for convenience
pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Errors from the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend-level failure (connection, query, constraint)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row that no longer maps onto the domain model
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

/// Key-value-like persistence gateway keyed by `external_id`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Idempotent create-if-absent of the backing table/schema.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert-or-update keyed by `external_id`.
    ///
    /// Overwrites side, display name and numeric fields, resets status to
    /// open and refreshes `updated_at`; never resets `created_at`.
    async fn upsert(&self, order: &Order) -> Result<(), StoreError>;

    /// Update the status of one order; a no-op for unknown ids and for
    /// transitions that do not change anything.
    async fn set_status(&self, external_id: &str, status: OrderStatus) -> Result<(), StoreError>;

    /// Full persisted set, ordered by creation time ascending.
    async fn list_all(&self) -> Result<Vec<PersistedOrder>, StoreError>;
}
