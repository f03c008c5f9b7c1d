//! Cache of the most recent bundle table.
//!
//! This module provides the `BundleCache` structure holding the table of the
//! last successful scan between scan intervals, along with metadata about
//! the cache state.

use std::sync::Arc;
use std::time::Instant;
use zaggregator::BundleTable;

/// Cache state for the latest bundle table with update timing information.
#[derive(Clone, Default)]
pub struct BundleCache {
    pub table: Option<Arc<BundleTable>>,
    pub last_updated: Option<Instant>,
    pub update_duration_seconds: f64,
    pub update_success: bool,
    pub is_updating: bool,
}

impl BundleCache {
    /// Seconds since the last successful update, if any.
    pub fn age_seconds(&self) -> Option<f64> {
        self.last_updated.map(|t| t.elapsed().as_secs_f64())
    }
}
