//! Core domain types shared across the pipeline.
//!
//! Provides the order-book side partition, order status lifecycle and the
//! fetched/persisted order representations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order-book side: the two partitions fetched per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Both sides, in the order the pipeline collects them.
    pub const ALL: [Side; 2] = [Side::Buy, Side::Sell];

    /// Wire value used in upstream request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(format!("Unknown side: '{}'. Valid options: buy, sell", s)),
        }
    }
}

/// Persisted order status.
///
/// `Open` means the order was present in the latest full fetch; `Close`
/// means it has since disappeared from the book. There is no hard delete:
/// a closed order flips back to open if its external id reappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Close,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Close => "close",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(OrderStatus::Open),
            "close" | "closed" => Ok(OrderStatus::Close),
            _ => Err(format!("Unknown status: '{}'. Valid options: open, close", s)),
        }
    }
}

/// An order as fetched from the upstream book, implicitly open.
///
/// `external_id` is the stable upstream identity and the conflict key for
/// persistence. Numeric fields already went through the coercion policy:
/// unparsable upstream values arrive here as zero, never as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub external_id: String,
    pub side: Side,
    /// Best-effort upstream username; "Unknown" when absent.
    pub display_name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub funds: Decimal,
}

/// An order row as held by the persistence gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedOrder {
    /// Surrogate id assigned by the store.
    pub id: i64,
    pub external_id: String,
    pub side: Side,
    pub display_name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub funds: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What triggered a pipeline run, carried into logs and the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunSource {
    Manual,
    Scheduled,
}

impl std::fmt::Display for RunSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunSource::Manual => write!(f, "manual"),
            RunSource::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl std::str::FromStr for RunSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(RunSource::Manual),
            "scheduled" | "cron" => Ok(RunSource::Scheduled),
            _ => Err(format!(
                "Unknown run source: '{}'. Valid options: manual, scheduled",
                s
            )),
        }
    }
}
