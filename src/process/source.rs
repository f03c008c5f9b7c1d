//! Process sources: where mirrors get their data from.
//!
//! `ProcessSource` is the seam between the bundling engine and the operating
//! system. `ProcFs` reads a (possibly relocated) `/proc` tree; the fixture
//! source in `process::fixture` replays a recorded process table.

use crate::error::{ProcessError, ScanError};
use crate::process::cpu::CpuTracker;
use crate::process::memory::read_status;
use crate::process::scanner::{collect_proc_entries, count_fds, read_cmdline, read_process_name};
use crate::process::stat::read_stat;
use crate::system::{read_cpu_stat, CpuStat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw per-process data as delivered by a source. Fields that could not be
/// read are zero/empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    #[serde(default)]
    pub ppid: u32,
    #[serde(default)]
    pub pgid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cmdline: Vec<String>,
    #[serde(default)]
    pub rss: u64,
    #[serde(default)]
    pub vms: u64,
    #[serde(default)]
    pub ctx_vol: u64,
    #[serde(default)]
    pub ctx_invol: u64,
    #[serde(default)]
    pub n_fds: u64,
    #[serde(default)]
    pub n_open_files: u64,
    #[serde(default)]
    pub n_sockets: u64,
    #[serde(default = "default_running")]
    pub running: bool,
}

fn default_running() -> bool {
    true
}

/// Provider of process data for one scan.
pub trait ProcessSource: Send + Sync {
    /// Lists every pid currently known. Failure here aborts the scan.
    fn pids(&self) -> Result<Vec<u32>, ScanError>;

    /// Reads one process. `ProcessError::Gone` means it exited after
    /// enumeration; partial reads degrade individual fields instead.
    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessError>;

    /// CPU percent of one core since the previous call for this pid (0.0 on
    /// the first call).
    fn cpu_percent(&self, pid: u32) -> Result<f64, ProcessError>;

    /// Live check whether the pid still refers to a running process.
    fn is_running(&self, pid: u32) -> bool;

    /// Drops CPU baselines of pids outside the current scan. Sources without
    /// per-pid state have nothing to drop.
    fn retain_cpu_baselines(&self, _keep: &dyn Fn(u32) -> bool) {}

    /// Host-wide CPU counters, if available.
    fn host_cpu_times(&self) -> Option<CpuStat>;
}

/// Process source backed by a procfs mount.
pub struct ProcFs {
    root: PathBuf,
    cpu: CpuTracker,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cpu: CpuTracker::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of pids with a stored CPU baseline.
    pub fn cpu_baselines(&self) -> usize {
        self.cpu.len()
    }

    fn proc_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }
}

impl ProcessSource for ProcFs {
    fn pids(&self) -> Result<Vec<u32>, ScanError> {
        collect_proc_entries(&self.root, None)
            .map(|entries| entries.into_iter().map(|e| e.pid).collect())
            .map_err(|source| ScanError::Enumeration {
                path: self.root.clone(),
                source,
            })
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessError> {
        let proc_path = self.proc_path(pid);
        let stat = read_stat(&proc_path).map_err(|e| ProcessError::from_io(pid, &e))?;

        let cmdline = read_cmdline(&proc_path).unwrap_or_else(|e| {
            debug!("Failed to read cmdline for pid {}: {}", pid, e);
            Vec::new()
        });
        let status = read_status(&proc_path).unwrap_or_else(|e| {
            debug!("Failed to read status for pid {}: {}", pid, e);
            Default::default()
        });
        // fd/ of foreign processes needs privileges
        let fds = count_fds(&proc_path).unwrap_or_default();
        let name = read_process_name(&proc_path).unwrap_or_else(|| stat.comm.clone());

        Ok(ProcessRecord {
            pid,
            ppid: stat.ppid,
            pgid: stat.pgrp,
            name,
            cmdline,
            rss: status.rss_bytes,
            vms: status.vms_bytes,
            ctx_vol: status.ctx_voluntary,
            ctx_invol: status.ctx_involuntary,
            n_fds: fds.total,
            n_open_files: fds.regular_files,
            n_sockets: fds.sockets,
            running: !stat.is_zombie(),
        })
    }

    fn cpu_percent(&self, pid: u32) -> Result<f64, ProcessError> {
        match read_stat(&self.proc_path(pid)) {
            Ok(stat) => Ok(self.cpu.observe(pid, stat.cpu_time_seconds()).cpu_percent),
            Err(e) => {
                self.cpu.forget(pid);
                Err(ProcessError::from_io(pid, &e))
            }
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        read_stat(&self.proc_path(pid))
            .map(|s| !s.is_zombie())
            .unwrap_or(false)
    }

    fn retain_cpu_baselines(&self, keep: &dyn Fn(u32) -> bool) {
        self.cpu.retain(keep);
    }

    fn host_cpu_times(&self) -> Option<CpuStat> {
        match read_cpu_stat(&self.root) {
            Ok(stat) => Some(stat),
            Err(e) => {
                debug!("Host CPU counters unavailable: {}", e);
                None
            }
        }
    }
}
