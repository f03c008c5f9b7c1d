//! In-memory sample store: one ring buffer per bundle.
//!
//! The store is an explicit handle. The owner opens it with a retention
//! policy, feeds it one record per bundle per scan and closes it on
//! shutdown; writes after `close` fail with `StoreError::Closed`.

use crate::bundle::{BundleRecord, Metric, MetricValue};
use crate::error::StoreError;
use crate::ringbuffer::{Ringbuffer, SampleEntry, ENTRY_SIZE_BYTES};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Receiver of aggregated bundle records.
pub trait SampleSink: Send + Sync {
    fn add_record(&self, record: &BundleRecord) -> Result<(), StoreError>;
}

/// Retention policy of the sample store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Memory budget for all buffers in MB (default: 4)
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,

    /// Bundles the budget is divided across (default: 64)
    #[serde(default = "default_expected_bundles")]
    pub expected_bundles: usize,

    /// Minimum entries per bundle (default: 10)
    #[serde(default = "default_min_entries")]
    pub min_entries_per_bundle: usize,

    /// Maximum entries per bundle (default: 300)
    #[serde(default = "default_max_entries")]
    pub max_entries_per_bundle: usize,

    /// Samples older than this are not reported (default: 30)
    #[serde(default = "default_max_sample_age")]
    pub max_sample_age_seconds: u64,
}

fn default_max_memory_mb() -> usize {
    4
}
fn default_expected_bundles() -> usize {
    64
}
fn default_min_entries() -> usize {
    10
}
fn default_max_entries() -> usize {
    300
}
fn default_max_sample_age() -> u64 {
    30
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            expected_bundles: default_expected_bundles(),
            min_entries_per_bundle: default_min_entries(),
            max_entries_per_bundle: default_max_entries(),
            max_sample_age_seconds: default_max_sample_age(),
        }
    }
}

/// Statistics about the sample store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub open: bool,
    pub max_memory_mb: usize,
    pub entry_size_bytes: usize,
    pub entries_per_bundle: usize,
    pub max_bundles: usize,
    pub total_bundles: usize,
    pub total_entries: usize,
    pub estimated_ram_bytes: usize,
    pub max_sample_age_seconds: u64,
}

pub struct SampleStore {
    buffers: DashMap<String, Ringbuffer>,
    entries_per_bundle: usize,
    max_buffers: usize,
    config: RetentionConfig,
    open: AtomicBool,
}

impl SampleStore {
    /// Opens a store. The per-bundle capacity is fixed here: the memory
    /// budget divided across the expected bundles, clamped to the
    /// configured min/max.
    pub fn open(config: RetentionConfig) -> Self {
        let max_bytes = config.max_memory_mb * 1024 * 1024;
        let max_total_entries = max_bytes / ENTRY_SIZE_BYTES;
        let calculated = max_total_entries / config.expected_bundles.max(1);

        let entries_per_bundle = calculated
            .min(config.max_entries_per_bundle)
            .max(config.min_entries_per_bundle)
            .max(1);
        let max_buffers = (max_bytes / (entries_per_bundle * ENTRY_SIZE_BYTES)).max(1);

        info!(
            "Sample store opened: {} entries per bundle, at most {} bundles, max age {}s",
            entries_per_bundle, max_buffers, config.max_sample_age_seconds
        );

        Self {
            buffers: DashMap::new(),
            entries_per_bundle,
            max_buffers,
            config,
            open: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Closes the store and drops every buffer. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let bundles = self.buffers.len();
            self.buffers.clear();
            info!("Sample store closed ({} bundles dropped)", bundles);
        }
    }

    /// Appends one entry to the buffer of `name`, creating it on first use.
    /// A new buffer that would exceed the memory budget first evicts the
    /// buffers with the oldest newest sample.
    pub fn record(&self, name: &str, entry: SampleEntry) -> Result<(), StoreError> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        if !self.buffers.contains_key(name) && self.buffers.len() >= self.max_buffers {
            self.evict_oldest(self.buffers.len() + 1 - self.max_buffers);
        }
        self.buffers
            .entry(name.to_string())
            .or_insert_with(|| Ringbuffer::new(self.entries_per_bundle))
            .push(entry);
        Ok(())
    }

    /// Records a batch, stopping at the first failure, then drops the
    /// buffers of bundles that have not been seen within the max sample age.
    pub fn record_all(&self, records: &[BundleRecord]) -> Result<usize, StoreError> {
        for record in records {
            self.add_record(record)?;
        }
        let evicted = self.evict_stale_at(Utc::now().timestamp());
        debug!(
            "Stored {} bundle records, evicted {} stale bundles",
            records.len(),
            evicted
        );
        Ok(records.len())
    }

    /// Removes every buffer whose newest sample is older than the max
    /// sample age. Returns the number of removed buffers.
    pub fn evict_stale_at(&self, now: i64) -> usize {
        let before = self.buffers.len();
        self.buffers
            .retain(|_, rb| rb.latest().is_some_and(|e| self.is_fresh(e, now)));
        before - self.buffers.len()
    }

    fn evict_oldest(&self, count: usize) {
        let mut candidates: Vec<(i64, String)> = self
            .buffers
            .iter()
            .map(|b| {
                let newest = b.value().latest().map(|e| e.timestamp).unwrap_or(i64::MIN);
                (newest, b.key().clone())
            })
            .collect();
        candidates.sort_unstable();
        for (_, name) in candidates.into_iter().take(count) {
            self.buffers.remove(&name);
        }
        debug!("Evicted {} bundles over the memory budget", count);
    }

    fn is_fresh(&self, entry: &SampleEntry, now: i64) -> bool {
        now.saturating_sub(entry.timestamp) <= self.config.max_sample_age_seconds as i64
    }

    /// Bundles whose newest sample is not older than the max sample age,
    /// sorted by name.
    pub fn bundle_names(&self) -> Vec<String> {
        self.bundle_names_at(Utc::now().timestamp())
    }

    pub fn bundle_names_at(&self, now: i64) -> Vec<String> {
        let mut names: Vec<String> = self
            .buffers
            .iter()
            .filter(|b| b.value().latest().is_some_and(|e| self.is_fresh(e, now)))
            .map(|b| b.key().clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Newest value of one metric, if the bundle has a fresh sample.
    pub fn latest(&self, name: &str, metric: Metric) -> Option<MetricValue> {
        self.latest_at(name, metric, Utc::now().timestamp())
    }

    pub fn latest_at(&self, name: &str, metric: Metric, now: i64) -> Option<MetricValue> {
        let buffer = self.buffers.get(name)?;
        let entry = buffer.latest()?;
        if !self.is_fresh(entry, now) {
            return None;
        }
        Some(entry.value(metric))
    }

    /// All retained entries of a bundle, oldest first.
    pub fn history(&self, name: &str) -> Option<Vec<SampleEntry>> {
        self.buffers.get(name).map(|rb| rb.history())
    }

    pub fn stats(&self) -> StoreStats {
        let total_bundles = self.buffers.len();
        let total_entries = self.buffers.iter().map(|b| b.value().len()).sum();
        StoreStats {
            open: self.is_open(),
            max_memory_mb: self.config.max_memory_mb,
            entry_size_bytes: ENTRY_SIZE_BYTES,
            entries_per_bundle: self.entries_per_bundle,
            max_bundles: self.max_buffers,
            total_bundles,
            total_entries,
            estimated_ram_bytes: self.entries_per_bundle * ENTRY_SIZE_BYTES * total_bundles,
            max_sample_age_seconds: self.config.max_sample_age_seconds,
        }
    }
}

impl SampleSink for SampleStore {
    fn add_record(&self, record: &BundleRecord) -> Result<(), StoreError> {
        self.record(&record.name, SampleEntry::from(record))
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        self.close();
    }
}
