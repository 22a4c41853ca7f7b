pub mod collector;
pub mod config;
pub mod pipeline;
pub mod reconcile;
pub mod resilience;
pub mod store;
pub mod types;
pub mod upstream;
