//! Application state management for the aggregator daemon.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background scan task.

use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use zaggregator::health_stats::HealthStats;
use zaggregator::process::ProcessSource;
use zaggregator::SampleStore;

use crate::cache::BundleCache;
use crate::config::Config;
use crate::metrics::BundleMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: BundleMetrics,
    pub scrape_duration: Gauge,
    pub bundles_total: Gauge,
    pub processes_total: Gauge,
    pub scan_duration: Gauge,
    pub scan_success: Gauge,
    pub scan_updating: Gauge,
    pub cache: Arc<RwLock<BundleCache>>,
    pub config: Arc<Config>,
    /// Process table the scans read from (procfs or a fixture file).
    pub source: Arc<dyn ProcessSource>,
    /// Per-bundle sample history, fed once per scan.
    pub store: Arc<SampleStore>,
    pub health_stats: Arc<HealthStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Registers all metrics and opens the sample store.
    pub fn new(
        config: Config,
        source: Arc<dyn ProcessSource>,
    ) -> Result<SharedState, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let metrics = BundleMetrics::new(&registry)?;

        let scrape_duration = Gauge::new(
            "zaggregator_scrape_duration_seconds",
            "Time spent serving /metrics request (reading from cache)",
        )?;
        let bundles_total = Gauge::new(
            "zaggregator_bundles_total",
            "Number of bundles found by the last scan",
        )?;
        let processes_total = Gauge::new(
            "zaggregator_processes_total",
            "Number of processes read by the last scan",
        )?;
        let scan_duration = Gauge::new(
            "zaggregator_scan_duration_seconds",
            "Time spent on the last scan including the sampling interval",
        )?;
        let scan_success = Gauge::new(
            "zaggregator_scan_success",
            "Whether the last scan was successful (1) or failed (0)",
        )?;
        let scan_updating = Gauge::new(
            "zaggregator_scan_updating",
            "Whether a scan is currently in progress (1) or idle (0)",
        )?;

        if config.enable_telemetry.unwrap_or(true) {
            registry.register(Box::new(scrape_duration.clone()))?;
            registry.register(Box::new(bundles_total.clone()))?;
            registry.register(Box::new(processes_total.clone()))?;
            registry.register(Box::new(scan_duration.clone()))?;
            registry.register(Box::new(scan_success.clone()))?;
            registry.register(Box::new(scan_updating.clone()))?;
        }

        let store = Arc::new(SampleStore::open(config.retention.clone()));

        Ok(Arc::new(AppState {
            registry,
            metrics,
            scrape_duration,
            bundles_total,
            processes_total,
            scan_duration,
            scan_success,
            scan_updating,
            cache: Arc::new(RwLock::new(BundleCache::default())),
            config: Arc::new(config),
            source,
            store,
            health_stats: Arc::new(HealthStats::new()),
            start_time: Instant::now(),
        }))
    }
}
