//! # Resilience Module
//!
//! Reusable resilience patterns for the sync pipeline.
//!
//! ## Components
//! - `retry`: Generic retry with exponential backoff, shared by all upstream call sites.

pub mod retry;

// Re-export for convenience
pub use retry::{retry_with_backoff, RetryPolicy};
