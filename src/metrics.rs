//! Prometheus metrics for zaggregator.
//!
//! Bundle gauges carry a single `bundle` label. They are reset and refilled
//! from the cached bundle table on every scrape.

use prometheus::{Gauge, GaugeVec, Opts, Registry};
use zaggregator::bundle::{BundleStats, BundleTable};

/// Collection of bundle-level Prometheus metrics.
#[derive(Clone)]
pub struct BundleMetrics {
    pub bundle_rss_bytes: GaugeVec,
    pub bundle_vms_bytes: GaugeVec,
    pub bundle_cpu_ratio: GaugeVec,
    pub bundle_ctx_switches_voluntary: GaugeVec,
    pub bundle_ctx_switches_involuntary: GaugeVec,
    pub bundle_processes: GaugeVec,
    pub bundle_open_fds: GaugeVec,
    pub bundle_open_files: GaugeVec,
    pub bundle_sockets: GaugeVec,

    pub host_cpu_idle_ratio: Gauge,
}

fn bundle_gauge(name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help), &["bundle"])
}

impl BundleMetrics {
    /// Creates and registers all bundle metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let bundle_rss_bytes = bundle_gauge(
            "zaggregator_bundle_memory_rss_bytes",
            "Sum of resident memory of all processes in the bundle",
        )?;
        let bundle_vms_bytes = bundle_gauge(
            "zaggregator_bundle_memory_vms_bytes",
            "Sum of virtual memory of all processes in the bundle",
        )?;
        let bundle_cpu_ratio = bundle_gauge(
            "zaggregator_bundle_cpu_usage_ratio",
            "CPU usage of the bundle over the sampling interval (1.0 = one core)",
        )?;
        let bundle_ctx_switches_voluntary = bundle_gauge(
            "zaggregator_bundle_context_switches_voluntary",
            "Sum of voluntary context switches of the bundle's processes",
        )?;
        let bundle_ctx_switches_involuntary = bundle_gauge(
            "zaggregator_bundle_context_switches_involuntary",
            "Sum of involuntary context switches of the bundle's processes",
        )?;
        let bundle_processes = bundle_gauge(
            "zaggregator_bundle_processes",
            "Number of processes in the bundle",
        )?;
        let bundle_open_fds = bundle_gauge(
            "zaggregator_bundle_open_fds",
            "Open file descriptors of the bundle's processes",
        )?;
        let bundle_open_files = bundle_gauge(
            "zaggregator_bundle_open_files",
            "Descriptors of the bundle's processes pointing at regular files",
        )?;
        let bundle_sockets = bundle_gauge(
            "zaggregator_bundle_sockets",
            "Descriptors of the bundle's processes pointing at sockets",
        )?;
        let host_cpu_idle_ratio = Gauge::new(
            "zaggregator_host_cpu_idle_ratio",
            "Host idle CPU ratio over the sampling interval (0.0-1.0)",
        )?;

        registry.register(Box::new(bundle_rss_bytes.clone()))?;
        registry.register(Box::new(bundle_vms_bytes.clone()))?;
        registry.register(Box::new(bundle_cpu_ratio.clone()))?;
        registry.register(Box::new(bundle_ctx_switches_voluntary.clone()))?;
        registry.register(Box::new(bundle_ctx_switches_involuntary.clone()))?;
        registry.register(Box::new(bundle_processes.clone()))?;
        registry.register(Box::new(bundle_open_fds.clone()))?;
        registry.register(Box::new(bundle_open_files.clone()))?;
        registry.register(Box::new(bundle_sockets.clone()))?;
        registry.register(Box::new(host_cpu_idle_ratio.clone()))?;

        Ok(Self {
            bundle_rss_bytes,
            bundle_vms_bytes,
            bundle_cpu_ratio,
            bundle_ctx_switches_voluntary,
            bundle_ctx_switches_involuntary,
            bundle_processes,
            bundle_open_fds,
            bundle_open_files,
            bundle_sockets,
            host_cpu_idle_ratio,
        })
    }

    /// Resets all bundle gauges; bundles that disappeared lose their series.
    pub fn reset_bundle_metrics(&self) {
        self.bundle_rss_bytes.reset();
        self.bundle_vms_bytes.reset();
        self.bundle_cpu_ratio.reset();
        self.bundle_ctx_switches_voluntary.reset();
        self.bundle_ctx_switches_involuntary.reset();
        self.bundle_processes.reset();
        self.bundle_open_fds.reset();
        self.bundle_open_files.reset();
        self.bundle_sockets.reset();
    }

    fn set_bundle(&self, name: &str, stats: &BundleStats) {
        let labels = [name];
        self.bundle_rss_bytes.with_label_values(&labels).set(stats.rss as f64);
        self.bundle_vms_bytes.with_label_values(&labels).set(stats.vms as f64);
        self.bundle_cpu_ratio
            .with_label_values(&labels)
            .set(stats.pcpu / 100.0);
        self.bundle_ctx_switches_voluntary
            .with_label_values(&labels)
            .set(stats.ctx_vol as f64);
        self.bundle_ctx_switches_involuntary
            .with_label_values(&labels)
            .set(stats.ctx_invol as f64);
        self.bundle_processes
            .with_label_values(&labels)
            .set(stats.members as f64);
        self.bundle_open_fds.with_label_values(&labels).set(stats.n_fds as f64);
        self.bundle_open_files
            .with_label_values(&labels)
            .set(stats.n_open_files as f64);
        self.bundle_sockets
            .with_label_values(&labels)
            .set(stats.n_sockets as f64);
    }

    /// Refills the gauges from a table. Returns the number of exported bundles.
    pub fn export_table<F>(&self, table: &BundleTable, excluded: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.reset_bundle_metrics();
        let mut exported = 0;
        for bundle in table.bundles() {
            if excluded(&bundle.name) {
                continue;
            }
            self.set_bundle(&bundle.name, &table.aggregate(bundle));
            exported += 1;
        }
        self.host_cpu_idle_ratio.set(table.idle_percent() / 100.0);
        exported
    }
}
