//! Typed configuration bridging environment/CLI to domain components.
//!
//! Decouples wiring (env vars, flags) from the pipeline itself, so
//! components are constructed from validated configs and tests can build
//! them directly.

use std::time::Duration;

use thiserror::Error;

use crate::resilience::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    MissingVar(&'static str),
}

/// Upstream endpoint parameters held constant per run.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Fixed POST endpoint serving order-book pages
    pub endpoint: String,
    /// Settlement currency sent in every page request
    pub delivery_currency: String,
    /// Page size sent upstream
    pub page_size: u32,
    /// Per-request transport timeout
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    /// Build from environment variables.
    ///
    /// `BOOKSYNC_UPSTREAM_URL` is required; `BOOKSYNC_DELIVERY_CURRENCY`
    /// defaults to USDT.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = std::env::var("BOOKSYNC_UPSTREAM_URL")
            .map_err(|_| ConfigError::MissingVar("BOOKSYNC_UPSTREAM_URL"))?;
        let delivery_currency =
            std::env::var("BOOKSYNC_DELIVERY_CURRENCY").unwrap_or_else(|_| "USDT".to_string());

        Ok(Self {
            endpoint,
            delivery_currency,
            page_size: 10,
            request_timeout: Duration::from_secs(10),
        })
    }
}

/// Tuning for the page fetcher layer.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a fetched page absorbs duplicate calls
    pub cache_ttl: Duration,
    /// Retry bound and pacing for transient upstream failures
    pub retry: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3),
            retry: RetryPolicy::upstream_default(),
        }
    }
}

/// Tuning for the run orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Wall-clock bound on the combined collection phase
    pub collection_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection_timeout: Duration::from_secs(15),
        }
    }
}
