//! Integration tests for the health stats module.
//!
//! These tests verify that HealthStats tracks scans, store writes and
//! HTTP usage and renders them in its table.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use zaggregator::health_stats::{HealthStats, RunningStat};

#[test]
fn test_health_stats_initialize_empty() {
    let stats = HealthStats::new();

    let s = stats.scanned_processes.snapshot();
    assert_eq!(s.count, 0);
    assert_eq!(s.current, 0.0);
    assert_eq!(s.avg, 0.0);

    assert_eq!(stats.total_scans.load(Ordering::Relaxed), 0);
    assert_eq!(stats.vanished_processes.load(Ordering::Relaxed), 0);
    assert_eq!(stats.stored_records.load(Ordering::Relaxed), 0);
    assert_eq!(stats.get_scan_success_rate(), 100.0);
    assert_eq!(stats.get_last_scan_time_str(), "N/A");
}

#[test]
fn test_record_scan_updates_running_stats() {
    let stats = HealthStats::new();

    stats.record_scan(200, 12, 1, 1.25);
    stats.record_scan(300, 14, 2, 1.75);

    let processes = stats.scanned_processes.snapshot();
    assert_eq!(processes.count, 2);
    assert_eq!(processes.current, 300.0);
    assert_eq!(processes.min, 200.0);
    assert_eq!(processes.max, 300.0);
    assert_eq!(processes.avg, 250.0);

    let bundles = stats.bundles.snapshot();
    assert_eq!(bundles.current, 14.0);

    assert_eq!(stats.vanished_processes.load(Ordering::Relaxed), 3);
    assert_eq!(stats.total_scans.load(Ordering::Relaxed), 2);
    assert_ne!(stats.get_last_scan_time_str(), "N/A");
}

#[test]
fn test_scan_success_rate() {
    let stats = HealthStats::new();
    stats.record_scan(10, 1, 0, 0.1);
    stats.record_scan(10, 1, 0, 0.1);
    stats.record_scan(10, 1, 0, 0.1);
    stats.record_scan_failure();

    assert_eq!(stats.get_scan_success_rate(), 75.0);
    assert_eq!(stats.total_scans.load(Ordering::Relaxed), 4);
}

#[test]
fn test_query_and_store_counters() {
    let stats = HealthStats::new();
    stats.record_query(false);
    stats.record_query(true);
    stats.record_store_write(7);
    stats.record_store_error();

    assert_eq!(stats.query_calls.load(Ordering::Relaxed), 2);
    assert_eq!(stats.sentinel_answers.load(Ordering::Relaxed), 1);
    assert_eq!(stats.stored_records.load(Ordering::Relaxed), 7);
    assert_eq!(stats.store_errors.load(Ordering::Relaxed), 1);
}

#[test]
fn test_render_table_contains_sections() {
    let stats = HealthStats::new();
    stats.record_scan(150, 9, 0, 1.02);
    stats.record_http_request();
    stats.record_request_duration(2.5);
    stats.record_metrics_endpoint_call();

    let output = stats.render_table();

    for section in ["SCAN PERFORMANCE", "SAMPLE STORE", "HTTP SERVER"] {
        assert!(output.contains(section), "missing section {}", section);
    }
    assert!(output.contains("scanned_processes"));
    assert!(output.contains("vanished_processes_total"));
    assert!(output.contains("http_requests_last_minute"));
    assert!(output.contains("number of done scans: 1"));
}

#[test]
fn test_running_stat_average() {
    let mut s = RunningStat::default();
    assert_eq!(s.avg(), 0.0);
    s.add(1.0);
    s.add(2.0);
    s.add(6.0);
    assert_eq!(s.avg(), 3.0);
}

#[test]
fn test_thread_safety() {
    use std::thread;

    let stats = Arc::new(HealthStats::new());
    let mut handles = vec![];

    for i in 0..10 {
        let stats_clone = Arc::clone(&stats);
        handles.push(thread::spawn(move || {
            stats_clone.record_scan(100 + i, 5, 1, 0.5);
            stats_clone.record_http_request();
            stats_clone.record_query(i % 2 == 0);
        }));
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(stats.total_scans.load(Ordering::Relaxed), 10);
    assert_eq!(stats.vanished_processes.load(Ordering::Relaxed), 10);
    assert_eq!(stats.sentinel_answers.load(Ordering::Relaxed), 5);
    assert_eq!(stats.scanned_processes.snapshot().count, 10);
    assert_eq!(stats.http_request_timestamps.count_last_minute(), 10);
}
