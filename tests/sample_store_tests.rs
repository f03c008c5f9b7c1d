//! Integration tests for the sample store: scans feeding records in,
//! latest values and discovery names coming out.

use chrono::Utc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use zaggregator::bundle::{Metric, MetricValue, IDLE_BUNDLE};
use zaggregator::discovery::{discovery_document, DISCOVERY_MACRO};
use zaggregator::process::{FixtureProcess, FixtureSource};
use zaggregator::scan::{scan, ScanConfig};
use zaggregator::{BundleRecord, RetentionConfig, SampleSink, SampleStore, StoreError};

fn small_store(entries: usize) -> SampleStore {
    SampleStore::open(RetentionConfig {
        max_memory_mb: 1,
        expected_bundles: 4,
        min_entries_per_bundle: entries,
        max_entries_per_bundle: entries,
        max_sample_age_seconds: 30,
    })
}

fn record(name: &str, timestamp: i64, rss: u64) -> BundleRecord {
    BundleRecord {
        timestamp,
        name: name.to_string(),
        rss,
        vms: rss * 2,
        ctx_vol: 0,
        ctx_invol: 0,
        pcpu: 1.5,
        n_fds: 0,
        n_open_files: 0,
        n_sockets: 0,
        members: 1,
    }
}

#[test]
fn test_scan_records_flow_into_store() {
    let source = FixtureSource::new(vec![
        FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
        FixtureProcess::new(100, 1, 100, &["/usr/sbin/cron", "-f"]).with_memory(4096, 8192),
        FixtureProcess::new(200, 1, 200, &["/usr/sbin/sshd", "-D"])
            .with_memory(1000, 3000)
            .with_cpu(2.5),
    ])
    .with_host_idle(75.0);
    let table = scan(
        &source,
        &ScanConfig {
            sample_interval: Duration::ZERO,
            ..Default::default()
        },
    )
    .expect("scan");

    let store = SampleStore::open(RetentionConfig::default());
    let mut records = table.records();
    records.push(BundleRecord::idle(table.timestamp(), table.idle_percent()));
    assert_eq!(store.record_all(&records).expect("store open"), 4);

    assert_eq!(store.latest("cron", Metric::MemRss), Some(MetricValue::Int(4096)));
    assert_eq!(store.latest("sshd", Metric::MemVms), Some(MetricValue::Int(3000)));
    assert_eq!(store.latest("sshd", Metric::Pcpu), Some(MetricValue::Float(2.5)));
    assert_eq!(
        store.latest(IDLE_BUNDLE, Metric::Pcpu).map(|v| v.to_string()),
        Some("75.0".to_string())
    );
    assert_eq!(store.latest("nope", Metric::Pcpu), None);

    let names = store.bundle_names();
    assert_eq!(names, vec!["cron", "idle", "kernel", "sshd"]);

    // the idle entry is moved to the end of the discovery document
    let doc = discovery_document(&names);
    let data = doc["data"].as_array().expect("data array");
    assert_eq!(data.len(), 4);
    assert_eq!(data[3][DISCOVERY_MACRO], IDLE_BUNDLE);
}

#[test]
fn test_buffers_keep_newest_entries() {
    let store = small_store(3);
    let now = Utc::now().timestamp();
    for i in 0..5 {
        store
            .add_record(&record("nginx", now - 4 + i, 100 + i as u64))
            .expect("store open");
    }

    let history = store.history("nginx").expect("nginx buffer");
    let rss: Vec<u64> = history.iter().map(|e| e.rss).collect();
    assert_eq!(rss, vec![102, 103, 104]);
    assert_eq!(store.latest("nginx", Metric::MemRss), Some(MetricValue::Int(104)));

    let stats = store.stats();
    assert_eq!(stats.entries_per_bundle, 3);
    assert_eq!(stats.total_bundles, 1);
    assert_eq!(stats.total_entries, 3);
}

#[test]
fn test_stale_bundles_drop_out() {
    let store = small_store(10);
    let now = Utc::now().timestamp();
    store.add_record(&record("fresh", now, 1)).expect("store open");
    store.add_record(&record("stale", now - 3600, 1)).expect("store open");

    assert_eq!(store.bundle_names(), vec!["fresh"]);
    assert_eq!(store.latest("stale", Metric::MemRss), None);
    // still retained, just not reported
    assert_eq!(store.history("stale").map(|h| h.len()), Some(1));
}

#[test]
fn test_closed_store_rejects_writes() {
    let store = small_store(10);
    store.close();
    let now = Utc::now().timestamp();
    assert_eq!(
        store.record_all(&[record("cron", now, 1)]),
        Err(StoreError::Closed)
    );
    assert!(store.bundle_names().is_empty());
    assert!(!store.stats().open);
}

#[test]
fn test_concurrent_writers() {
    let store = Arc::new(small_store(50));
    let now = Utc::now().timestamp();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    store
                        .add_record(&record(&format!("bundle-{}", t), now, i))
                        .expect("store open");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer thread");
    }

    let stats = store.stats();
    assert_eq!(stats.total_bundles, 4);
    assert_eq!(stats.total_entries, 100);
    assert_eq!(store.bundle_names().len(), 4);
}
