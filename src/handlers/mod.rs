//! HTTP endpoint handlers for the aggregator.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/config`: Configuration display endpoint
//! - `/bundles`: Bundle table of the last scan
//! - `/discovery`: Low-level discovery document
//! - `/bundle/{name}/{check}`: Single-value bundle query

pub mod bundles;
pub mod config;
pub mod discovery;
pub mod health;
pub mod metrics;
pub mod query;
pub mod root;

// Re-export handlers
pub use bundles::bundles_handler;
pub use config::config_handler;
pub use discovery::discovery_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use query::query_handler;
pub use root::root_handler;
