//! One complete scan: capture, sample, build, merge.
//!
//! A scan is a synchronous unit of work. The only blocking point is the
//! sampling interval; the caller decides where it runs.

use crate::bundle::{BoundaryPredicate, BundleTable, KernelBoundary};
use crate::error::ScanError;
use crate::process::{CaptureOptions, ProcessSource, Sampler, Snapshot, DEFAULT_SAMPLE_INTERVAL};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Parameters of one scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    pub sample_interval: Duration,
    pub boundary: KernelBoundary,
    pub capture: CaptureOptions,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            boundary: KernelBoundary::default(),
            capture: CaptureOptions::default(),
        }
    }
}

/// Timings and counters of a finished scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    pub processes: usize,
    pub bundles: usize,
    /// Processes that were gone at capture or exited during sampling.
    pub vanished: usize,
    pub duration: Duration,
}

/// Runs a scan with the configured kernel boundary.
pub fn scan<S: ProcessSource + ?Sized>(source: &S, config: &ScanConfig) -> Result<BundleTable, ScanError> {
    scan_with(source, config, &config.boundary).map(|(table, _)| table)
}

/// Runs a scan with an arbitrary boundary predicate and reports its summary.
#[instrument(skip(source, config, boundary))]
pub fn scan_with<S: ProcessSource + ?Sized>(
    source: &S,
    config: &ScanConfig,
    boundary: &dyn BoundaryPredicate,
) -> Result<(BundleTable, ScanSummary), ScanError> {
    let start = Instant::now();

    let mut snapshot = Snapshot::capture(source, &config.capture)?;
    let not_running = snapshot.not_running_count();

    let report = Sampler::new(config.sample_interval).sample(source, &mut snapshot);

    let table = BundleTable::build(snapshot, boundary);
    let summary = ScanSummary {
        processes: report.sampled,
        bundles: table.len(),
        vanished: not_running + report.exited,
        duration: start.elapsed(),
    };
    debug!(
        "Scan finished: {} processes, {} bundles, {} vanished in {:.3}s",
        summary.processes,
        summary.bundles,
        summary.vanished,
        summary.duration.as_secs_f64()
    );
    Ok((table, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{FixtureProcess, FixtureSource, ProcessMirror};

    fn fixture_config() -> ScanConfig {
        ScanConfig {
            sample_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_fixture() {
        let source = FixtureSource::new(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(2, 0, 0, &[]).with_name("kthreadd"),
            FixtureProcess::new(300, 1, 300, &["/usr/sbin/cron", "-f"]).with_cpu(0.5),
        ]);
        let (table, summary) =
            scan_with(&source, &fixture_config(), &KernelBoundary::PgidZero).expect("scan");
        assert_eq!(summary.processes, 3);
        assert_eq!(summary.vanished, 0);
        assert!(table.bundle("kernel").is_some());
        // init leads cron's tree when only pgid 0 is the boundary
        let init = table.bundle("init").expect("init");
        assert!(init.contains(300));
    }

    #[test]
    fn test_custom_boundary_predicate() {
        let source = FixtureSource::new(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(300, 1, 300, &["/usr/sbin/cron", "-f"]),
        ]);
        let everything = |_: &ProcessMirror| true;
        let (table, _) = scan_with(&source, &fixture_config(), &everything).expect("scan");
        assert_eq!(table.names(), vec!["kernel"]);
    }

    #[test]
    fn test_enumeration_failure_is_fatal() {
        struct Broken;
        impl ProcessSource for Broken {
            fn pids(&self) -> Result<Vec<u32>, ScanError> {
                Err(ScanError::Fixture {
                    path: "/nowhere".into(),
                    reason: "unreadable".into(),
                })
            }
            fn read_process(
                &self,
                pid: u32,
            ) -> Result<crate::process::ProcessRecord, crate::error::ProcessError> {
                Err(crate::error::ProcessError::Gone(pid))
            }
            fn cpu_percent(&self, pid: u32) -> Result<f64, crate::error::ProcessError> {
                Err(crate::error::ProcessError::Gone(pid))
            }
            fn is_running(&self, _pid: u32) -> bool {
                false
            }
            fn host_cpu_times(&self) -> Option<crate::system::CpuStat> {
                None
            }
        }
        assert!(scan(&Broken, &fixture_config()).is_err());
    }
}
