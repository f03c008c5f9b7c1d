//! Periodic scanning for the aggregator daemon.
//!
//! One scan per interval runs on the blocking pool (the CPU sampling window
//! sleeps). Its table replaces the cached one, and one record per exported
//! bundle plus the idle record goes into the sample store.

use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use zaggregator::scan::scan_with;
use zaggregator::{BundleRecord, BundleTable};

use crate::state::SharedState;

/// Runs one scan and publishes its result.
///
/// Concurrent calls while a scan is in flight return immediately; the old
/// table stays available to readers until the new one is swapped in.
#[instrument(skip(state))]
pub async fn update_cache(state: &SharedState) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    {
        let mut cache = state.cache.write().await;
        if cache.is_updating {
            debug!("Scan already in progress, serving stale table");
            return Ok(());
        }
        cache.is_updating = true;
        state.scan_updating.set(1.0);
    }

    info!("Starting scan");

    let source = Arc::clone(&state.source);
    let scan_config = state.config.scan_config();
    let result = tokio::task::spawn_blocking(move || {
        let boundary = scan_config.boundary;
        scan_with(source.as_ref(), &scan_config, &boundary)
    })
    .await;

    let (table, summary) = match result {
        Ok(Ok(scanned)) => scanned,
        Ok(Err(e)) => {
            error!("Scan failed: {}", e);
            finish_failed(state).await;
            return Err(e.into());
        }
        Err(e) => {
            error!("Scan task aborted: {}", e);
            finish_failed(state).await;
            return Err(e.into());
        }
    };

    let stored = store_records(state, &table);

    let duration = start.elapsed().as_secs_f64();
    state.health_stats.record_scan(
        summary.processes as u64,
        summary.bundles as u64,
        summary.vanished as u64,
        duration,
    );
    state.bundles_total.set(summary.bundles as f64);
    state.processes_total.set(summary.processes as f64);
    state.scan_duration.set(duration);
    state.scan_success.set(1.0);

    {
        let mut cache = state.cache.write().await;
        cache.table = Some(Arc::new(table));
        cache.last_updated = Some(Instant::now());
        cache.update_duration_seconds = duration;
        cache.update_success = true;
        cache.is_updating = false;
        state.scan_updating.set(0.0);
    }

    info!(
        "Scan completed: {} processes, {} bundles, {} records stored, {:.2}ms",
        summary.processes,
        summary.bundles,
        stored,
        duration * 1000.0
    );

    Ok(())
}

async fn finish_failed(state: &SharedState) {
    state.health_stats.record_scan_failure();
    state.scan_success.set(0.0);
    let mut cache = state.cache.write().await;
    cache.update_success = false;
    cache.is_updating = false;
    state.scan_updating.set(0.0);
}

/// Records of the exported bundles plus the idle pseudo-bundle.
fn collect_records(state: &SharedState, table: &BundleTable) -> Vec<BundleRecord> {
    let mut records: Vec<BundleRecord> = table
        .records()
        .into_iter()
        .filter(|r| !state.config.is_excluded(&r.name))
        .collect();
    let idle = BundleRecord::idle(table.timestamp(), table.idle_percent());
    if !state.config.is_excluded(&idle.name) {
        records.push(idle);
    }
    records
}

fn store_records(state: &SharedState, table: &BundleTable) -> usize {
    let records = collect_records(state, table);
    match state.store.record_all(&records) {
        Ok(n) => {
            state.health_stats.record_store_write(n as u64);
            n
        }
        Err(e) => {
            warn!("Failed to store bundle records: {}", e);
            state.health_stats.record_store_error();
            0
        }
    }
}

/// Scans every `scan_interval` until the task is dropped.
pub fn spawn_scan_loop(state: SharedState) -> tokio::task::JoinHandle<()> {
    let period = state.config.scan_interval();
    info!("Background scan every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and the initial scan already ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = update_cache(&state).await {
                warn!("Background scan failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::test_support::{fixture_source, test_config, test_state};
    use crate::state::AppState;
    use std::sync::atomic::Ordering;
    use zaggregator::bundle::{Metric, MetricValue};

    #[tokio::test]
    async fn test_update_cache_publishes_table_and_records() {
        let state = test_state();
        update_cache(&state).await.expect("scan");

        let cache = state.cache.read().await;
        let table = cache.table.as_ref().expect("table cached");
        let mut names = table.names();
        names.sort_unstable();
        assert_eq!(names, vec!["cron", "kernel", "nginx:daemon"]);
        assert!(cache.update_success);
        assert!(!cache.is_updating);

        // three bundles plus idle
        assert_eq!(state.health_stats.stored_records.load(Ordering::Relaxed), 4);
        assert_eq!(
            state.store.latest("cron", Metric::MemRss),
            Some(MetricValue::Int(4096))
        );
        let idle = state.store.latest("idle", Metric::Pcpu).expect("idle");
        assert!((idle.as_f64() - 87.5).abs() < 1e-6);
        assert_eq!(state.bundles_total.get(), 3.0);
    }

    #[tokio::test]
    async fn test_excluded_bundles_not_stored() {
        let config = Config {
            exclude_bundles: Some(vec!["kernel".to_string(), "idle".to_string()]),
            ..test_config()
        };
        let state = AppState::new(config, fixture_source()).expect("state");
        update_cache(&state).await.expect("scan");

        assert_eq!(state.store.latest("kernel", Metric::MemRss), None);
        assert_eq!(state.store.latest("idle", Metric::Pcpu), None);
        assert_eq!(state.health_stats.stored_records.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_concurrent_update_skipped() {
        let state = test_state();
        state.cache.write().await.is_updating = true;
        update_cache(&state).await.expect("skip");
        assert!(state.cache.read().await.table.is_none());
        assert_eq!(state.health_stats.total_scans.load(Ordering::Relaxed), 0);
    }
}
