//! Health statistics for the aggregator daemon.
//!
//! Tracks scan performance, bundle counts, vanished processes, sample store
//! writes and HTTP usage, and renders them as a plain-text table.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

const LEFT_COL: usize = 26;
const COL_W: usize = 12;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

/// Point-in-time view of a `Stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub current: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                current: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

/// Timestamps of recent HTTP requests, pruned to the last ten minutes.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            if let Some(cutoff) = now.checked_sub(Duration::from_secs(600)) {
                while guard.front().is_some_and(|&t| t < cutoff) {
                    guard.pop_front();
                }
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        let Ok(guard) = self.inner.lock() else {
            return 0;
        };
        match Instant::now().checked_sub(Duration::from_secs(60)) {
            Some(cutoff) => guard.iter().filter(|&&t| t >= cutoff).count() as u64,
            None => guard.len() as u64,
        }
    }
}

/// Daemon-wide counters and running statistics.
pub struct HealthStats {
    // Scans
    pub scanned_processes: Stat,
    pub scan_duration_seconds: Stat,
    pub bundles: Stat,
    pub total_scans: AtomicU64,
    pub scan_success_count: AtomicU64,
    pub scan_failure_count: AtomicU64,
    pub vanished_processes: AtomicU64,

    // Sample store
    pub stored_records: AtomicU64,
    pub store_errors: AtomicU64,

    // HTTP
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,
    pub metrics_endpoint_calls: AtomicU64,
    pub query_calls: AtomicU64,
    pub sentinel_answers: AtomicU64,

    pub start_time: Instant,
    pub last_scan_time: StdRwLock<Option<DateTime<Utc>>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            scanned_processes: Stat::default(),
            scan_duration_seconds: Stat::default(),
            bundles: Stat::default(),
            total_scans: AtomicU64::new(0),
            scan_success_count: AtomicU64::new(0),
            scan_failure_count: AtomicU64::new(0),
            vanished_processes: AtomicU64::new(0),
            stored_records: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            query_calls: AtomicU64::new(0),
            sentinel_answers: AtomicU64::new(0),
            start_time: Instant::now(),
            last_scan_time: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a finished scan and counts it as a success.
    pub fn record_scan(&self, processes: u64, bundles: u64, vanished: u64, duration_seconds: f64) {
        self.scanned_processes.add_sample(processes as f64);
        self.bundles.add_sample(bundles as f64);
        self.scan_duration_seconds.add_sample(duration_seconds);
        self.vanished_processes.fetch_add(vanished, Ordering::Relaxed);
        self.total_scans.fetch_add(1, Ordering::Relaxed);
        self.scan_success_count.fetch_add(1, Ordering::Relaxed);
        self.update_last_scan_time();
    }

    pub fn record_scan_failure(&self) {
        self.total_scans.fetch_add(1, Ordering::Relaxed);
        self.scan_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_write(&self, records: u64) {
        self.stored_records.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a bundle query; `sentinel` marks answers that fell back to "0.0".
    pub fn record_query(&self, sentinel: bool) {
        self.query_calls.fetch_add(1, Ordering::Relaxed);
        if sentinel {
            self.sentinel_answers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn update_last_scan_time(&self) {
        if let Ok(mut guard) = self.last_scan_time.write() {
            *guard = Some(Utc::now());
        }
    }

    pub fn get_scan_success_rate(&self) -> f64 {
        let success = self.scan_success_count.load(Ordering::Relaxed);
        let failure = self.scan_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_hours(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 3600.0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_scan_time_str(&self) -> String {
        self.last_scan_time
            .read()
            .ok()
            .and_then(|guard| *guard)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn render_table(&self) -> String {
        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - AGGREGATOR INTERNAL STATS").ok();
        writeln!(out, "============================================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = LEFT_COL,
            col = COL_W
        )
        .ok();

        section(&mut out, "SCAN PERFORMANCE");
        stat_row(&mut out, "scanned_processes", &self.scanned_processes.snapshot(), 0);
        stat_row(&mut out, "bundles", &self.bundles.snapshot(), 0);
        stat_row(&mut out, "scan_duration (s)", &self.scan_duration_seconds.snapshot(), 3);
        let rate = self.get_scan_success_rate();
        let rate = StatSnapshot {
            current: rate,
            avg: rate,
            max: rate,
            min: rate,
            count: 1,
        };
        stat_row(&mut out, "scan_success_rate (%)", &rate, 1);
        counter_row(&mut out, "scan_failures", self.scan_failure_count.load(Ordering::Relaxed));
        counter_row(
            &mut out,
            "vanished_processes_total",
            self.vanished_processes.load(Ordering::Relaxed),
        );

        section(&mut out, "SAMPLE STORE");
        counter_row(&mut out, "stored_records_total", self.stored_records.load(Ordering::Relaxed));
        counter_row(&mut out, "store_errors", self.store_errors.load(Ordering::Relaxed));

        section(&mut out, "HTTP SERVER");
        counter_row(
            &mut out,
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute(),
        );
        stat_row(&mut out, "request_duration (ms)", &self.request_duration_ms.snapshot(), 1);
        counter_row(
            &mut out,
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls.load(Ordering::Relaxed),
        );
        counter_row(&mut out, "bundle_queries", self.query_calls.load(Ordering::Relaxed));
        counter_row(&mut out, "sentinel_answers", self.sentinel_answers.load(Ordering::Relaxed));

        writeln!(out).ok();
        writeln!(
            out,
            "number of done scans: {} | last scan: {} | uptime: {:.1}h",
            self.total_scans.load(Ordering::Relaxed),
            self.get_last_scan_time_str(),
            self.get_uptime_hours()
        )
        .ok();

        out
    }
}

fn section(out: &mut String, title: &str) {
    writeln!(out).ok();
    writeln!(out, "{}", title).ok();
    writeln!(out, "{}", "-".repeat(title.len())).ok();
}

fn stat_row(out: &mut String, label: &str, s: &StatSnapshot, precision: usize) {
    // averages always carry one decimal more than whole-number series
    let avg_precision = precision.max(1);
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        label,
        format!("{:.p$}", s.current, p = precision),
        format!("{:.p$}", s.avg, p = avg_precision),
        format!("{:.p$}", s.max, p = precision),
        format!("{:.p$}", s.min, p = precision),
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

fn counter_row(out: &mut String, label: &str, value: u64) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        label,
        value,
        "N/A",
        "N/A",
        "N/A",
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}
