//! Postgres-backed order store.
//!
//! Runtime `sqlx` queries against a single `orders` table with a unique
//! `external_id`. The upsert rides on `ON CONFLICT` so concurrent runs
//! racing on the same id converge last-writer-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use super::{OrderStore, StoreError};
use crate::types::{Order, OrderStatus, PersistedOrder, Side};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id          BIGSERIAL PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    side        TEXT NOT NULL,
    display_name TEXT NOT NULL DEFAULT 'Unknown',
    price       NUMERIC NOT NULL DEFAULT 0,
    quantity    NUMERIC NOT NULL DEFAULT 0,
    funds       NUMERIC NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'open',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const UPSERT: &str = r#"
INSERT INTO orders (external_id, side, display_name, price, quantity, funds, status)
VALUES ($1, $2, $3, $4, $5, $6, 'open')
ON CONFLICT (external_id) DO UPDATE SET
    side = EXCLUDED.side,
    display_name = EXCLUDED.display_name,
    price = EXCLUDED.price,
    quantity = EXCLUDED.quantity,
    funds = EXCLUDED.funds,
    status = 'open',
    updated_at = now()
"#;

const SET_STATUS: &str = "UPDATE orders SET status = $2, updated_at = now() WHERE external_id = $1";

const LIST_ALL: &str = r#"
SELECT id, external_id, side, display_name, price, quantity, funds, status, created_at, updated_at
FROM orders
ORDER BY created_at ASC, id ASC
"#;

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        info!("Connected to Postgres order store");
        Ok(Self { pool })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(&order.external_id)
            .bind(order.side.as_str())
            .bind(&order.display_name)
            .bind(order.price)
            .bind(order.quantity)
            .bind(order.funds)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, external_id: &str, status: OrderStatus) -> Result<(), StoreError> {
        sqlx::query(SET_STATUS)
            .bind(external_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PersistedOrder>, StoreError> {
        let rows = sqlx::query(LIST_ALL).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_order).collect()
    }
}

fn row_to_order(row: &PgRow) -> Result<PersistedOrder, StoreError> {
    let side: String = row.try_get("side")?;
    let status: String = row.try_get("status")?;

    Ok(PersistedOrder {
        id: row.try_get::<i64, _>("id")?,
        external_id: row.try_get("external_id")?,
        side: side.parse::<Side>().map_err(StoreError::InvalidRow)?,
        display_name: row.try_get("display_name")?,
        price: row.try_get::<Decimal, _>("price")?,
        quantity: row.try_get::<Decimal, _>("quantity")?,
        funds: row.try_get::<Decimal, _>("funds")?,
        status: status.parse::<OrderStatus>().map_err(StoreError::InvalidRow)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
