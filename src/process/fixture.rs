//! Process source replaying a recorded process table.
//!
//! Fixture files are JSON documents produced by `zaggregator generate-testdata`
//! (or written by hand). They make scans reproducible: CPU readings, process
//! exits between the two sampler passes and the host idle share are all part
//! of the fixture.

use crate::error::{ProcessError, ScanError};
use crate::process::source::{ProcessRecord, ProcessSource};
use crate::system::CpuStat;
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// Ticks per host CPU reading; idle percent is resolved to 1/100 of a percent.
const HOST_TICKS_PER_READ: u64 = 10_000;

/// One process of a fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureProcess {
    #[serde(flatten)]
    pub record: ProcessRecord,
    /// Value reported by the second CPU reading.
    #[serde(default)]
    pub cpu_percent: f64,
    /// The process exits between the prime and the delta CPU reading.
    #[serde(default)]
    pub exits_after_prime: bool,
    /// The process is listed but gone before its details can be read.
    #[serde(default)]
    pub gone: bool,
}

impl FixtureProcess {
    pub fn new(pid: u32, ppid: u32, pgid: u32, cmdline: &[&str]) -> Self {
        let name = cmdline
            .first()
            .and_then(|t| t.split(|c: char| c == ' ' || c == ':').next())
            .map(|t| t.rsplit('/').next().unwrap_or(t))
            .unwrap_or_default()
            .chars()
            .take(15)
            .collect();
        Self {
            record: ProcessRecord {
                pid,
                ppid,
                pgid,
                name,
                cmdline: cmdline.iter().map(|s| s.to_string()).collect(),
                running: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.record.name = name.to_string();
        self
    }

    pub fn with_cpu(mut self, cpu_percent: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self
    }

    pub fn with_memory(mut self, rss: u64, vms: u64) -> Self {
        self.record.rss = rss;
        self.record.vms = vms;
        self
    }

    pub fn with_ctx_switches(mut self, voluntary: u64, involuntary: u64) -> Self {
        self.record.ctx_vol = voluntary;
        self.record.ctx_invol = involuntary;
        self
    }

    pub fn with_fds(mut self, total: u64, files: u64, sockets: u64) -> Self {
        self.record.n_fds = total;
        self.record.n_open_files = files;
        self.record.n_sockets = sockets;
        self
    }

    pub fn exiting_after_prime(mut self) -> Self {
        self.exits_after_prime = true;
        self
    }

    pub fn gone(mut self) -> Self {
        self.gone = true;
        self
    }
}

/// Root structure of a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFixture {
    pub version: String,
    pub generated_at: String,
    #[serde(default)]
    pub host_idle_percent: f64,
    pub processes: Vec<FixtureProcess>,
}

/// Load a fixture from a JSON file.
pub fn load_fixture(path: &Path) -> Result<ProcessFixture, ScanError> {
    debug!("Loading process fixture from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| ScanError::Fixture {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let fixture: ProcessFixture =
        serde_json::from_str(&content).map_err(|e| ScanError::Fixture {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    info!(
        "Loaded process fixture version {} from {} ({} processes)",
        fixture.version,
        fixture.generated_at,
        fixture.processes.len()
    );

    Ok(fixture)
}

/// `ProcessSource` over an in-memory fixture.
pub struct FixtureSource {
    order: Vec<u32>,
    processes: HashMap<u32, FixtureProcess>,
    host_idle_percent: f64,
    cpu_reads: Mutex<HashMap<u32, u32>>,
    host_reads: AtomicU64,
}

impl FixtureSource {
    pub fn new(processes: Vec<FixtureProcess>) -> Self {
        let order = processes.iter().map(|p| p.record.pid).collect();
        let processes = processes
            .into_iter()
            .map(|p| (p.record.pid, p))
            .collect();
        Self {
            order,
            processes,
            host_idle_percent: 0.0,
            cpu_reads: Mutex::new(HashMap::new()),
            host_reads: AtomicU64::new(0),
        }
    }

    pub fn with_host_idle(mut self, idle_percent: f64) -> Self {
        self.host_idle_percent = idle_percent.clamp(0.0, 100.0);
        self
    }

    pub fn from_fixture(fixture: ProcessFixture) -> Self {
        let idle = fixture.host_idle_percent;
        Self::new(fixture.processes).with_host_idle(idle)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        load_fixture(path).map(Self::from_fixture)
    }

    fn cpu_reads_of(&self, pid: u32) -> u32 {
        self.cpu_reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pid)
            .copied()
            .unwrap_or(0)
    }
}

impl ProcessSource for FixtureSource {
    fn pids(&self) -> Result<Vec<u32>, ScanError> {
        Ok(self.order.clone())
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessError> {
        match self.processes.get(&pid) {
            Some(p) if !p.gone => Ok(p.record.clone()),
            _ => Err(ProcessError::Gone(pid)),
        }
    }

    fn cpu_percent(&self, pid: u32) -> Result<f64, ProcessError> {
        let p = match self.processes.get(&pid) {
            Some(p) if !p.gone => p,
            _ => return Err(ProcessError::Gone(pid)),
        };

        let reads = {
            let mut guard = self.cpu_reads.lock().unwrap_or_else(|e| e.into_inner());
            let counter = guard.entry(pid).or_insert(0);
            *counter += 1;
            *counter
        };

        match reads {
            1 => Ok(0.0),
            _ if p.exits_after_prime => Err(ProcessError::Gone(pid)),
            _ => Ok(p.cpu_percent),
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        match self.processes.get(&pid) {
            Some(p) if !p.gone => {
                p.record.running && !(p.exits_after_prime && self.cpu_reads_of(pid) > 0)
            }
            _ => false,
        }
    }

    fn host_cpu_times(&self) -> Option<CpuStat> {
        let n = self.host_reads.fetch_add(1, Ordering::Relaxed) + 1;
        let idle_per_read = (self.host_idle_percent * 100.0).round() as u64;
        Some(CpuStat {
            user: (HOST_TICKS_PER_READ - idle_per_read) * n,
            idle: idle_per_read * n,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::idle_percent;
    use tempfile::tempdir;

    #[test]
    fn test_cpu_reading_protocol() {
        let source = FixtureSource::new(vec![
            FixtureProcess::new(10, 1, 10, &["worker"]).with_cpu(42.5),
            FixtureProcess::new(11, 1, 11, &["short-lived"])
                .with_cpu(99.0)
                .exiting_after_prime(),
        ]);

        assert_eq!(source.cpu_percent(10), Ok(0.0));
        assert_eq!(source.cpu_percent(10), Ok(42.5));

        assert!(source.is_running(11));
        assert_eq!(source.cpu_percent(11), Ok(0.0));
        assert!(!source.is_running(11));
        assert_eq!(source.cpu_percent(11), Err(ProcessError::Gone(11)));
    }

    #[test]
    fn test_gone_process() {
        let source = FixtureSource::new(vec![FixtureProcess::new(5, 1, 5, &["x"]).gone()]);
        assert_eq!(source.pids().expect("pids"), vec![5]);
        assert_eq!(source.read_process(5), Err(ProcessError::Gone(5)));
        assert!(!source.is_running(5));
        assert_eq!(source.read_process(6), Err(ProcessError::Gone(6)));
    }

    #[test]
    fn test_host_idle_readings() {
        let source = FixtureSource::new(Vec::new()).with_host_idle(37.5);
        let before = source.host_cpu_times().expect("counters");
        let after = source.host_cpu_times().expect("counters");
        assert!((idle_percent(&before, &after) - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_fixture_file_roundtrip_through_loader() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("fixture.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1.0",
                "generated_at": "2024-01-01T00:00:00Z",
                "host_idle_percent": 80.0,
                "processes": [
                    {"pid": 1, "ppid": 0, "pgid": 1, "name": "init", "cmdline": ["/sbin/init"]},
                    {"pid": 20, "ppid": 1, "pgid": 20, "cmdline": ["sshd"], "rss": 4096, "cpu_percent": 1.5}
                ]
            }"#,
        )
        .expect("write fixture");

        let source = FixtureSource::from_file(&path).expect("valid fixture");
        assert_eq!(source.pids().expect("pids"), vec![1, 20]);
        let sshd = source.read_process(20).expect("present");
        assert_eq!(sshd.rss, 4096);
        assert!(sshd.running);
    }

    #[test]
    fn test_invalid_fixture_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            FixtureSource::from_file(&path),
            Err(ScanError::Fixture { .. })
        ));
        assert!(FixtureSource::from_file(&dir.path().join("missing.json")).is_err());
    }
}
