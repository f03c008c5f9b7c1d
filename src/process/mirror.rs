//! Immutable per-process snapshot.

use crate::process::source::{ProcessRecord, ProcessSource};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::debug;

/// One process as captured at scan time.
///
/// Every field is fixed at construction. The CPU percent is the exception:
/// it starts unset and is assigned once by the sampler.
#[derive(Debug, Serialize)]
pub struct ProcessMirror {
    pub pid: u32,
    /// 0 if the process had no parent or was already gone.
    pub ppid: u32,
    /// Child pids present in the same snapshot, ascending.
    pub children: Vec<u32>,
    /// 0 for kernel threads and for processes that vanished before capture.
    pub pgid: u32,
    /// Short name (`comm`).
    pub name: String,
    pub cmdline: Vec<String>,
    pub rss: u64,
    pub vms: u64,
    pub ctx_vol: u64,
    pub ctx_invol: u64,
    pub n_fds: u64,
    pub n_open_files: u64,
    pub n_sockets: u64,
    /// Running state at capture time. Use `is_running` for a live answer.
    pub running: bool,
    #[serde(skip)]
    pcpu: OnceCell<f64>,
}

impl ProcessMirror {
    /// Reads `pid` through the source. A process that is gone still yields a
    /// mirror, with everything zeroed and `running == false`.
    pub fn capture<S: ProcessSource + ?Sized>(source: &S, pid: u32) -> Self {
        match source.read_process(pid) {
            Ok(record) => Self::from_record(record, Vec::new()),
            Err(e) => {
                debug!("Capturing pid {} degraded to an empty mirror: {}", pid, e);
                Self::vanished(pid)
            }
        }
    }

    pub fn from_record(record: ProcessRecord, children: Vec<u32>) -> Self {
        Self {
            pid: record.pid,
            ppid: record.ppid,
            children,
            pgid: record.pgid,
            name: record.name,
            cmdline: record.cmdline,
            rss: record.rss,
            vms: record.vms,
            ctx_vol: record.ctx_vol,
            ctx_invol: record.ctx_invol,
            n_fds: record.n_fds,
            n_open_files: record.n_open_files,
            n_sockets: record.n_sockets,
            running: record.running,
            pcpu: OnceCell::new(),
        }
    }

    /// Mirror of a process that exited before it could be read.
    pub fn vanished(pid: u32) -> Self {
        Self::from_record(
            ProcessRecord {
                pid,
                running: false,
                ..Default::default()
            },
            Vec::new(),
        )
    }

    pub(crate) fn with_children(mut self, children: Vec<u32>) -> Self {
        self.children = children;
        self
    }

    /// Sampled CPU percent; 0.0 until the sampler has run.
    pub fn cpu_percent(&self) -> f64 {
        self.pcpu.get().copied().unwrap_or(0.0)
    }

    pub fn is_sampled(&self) -> bool {
        self.pcpu.get().is_some()
    }

    /// Assigns the sampled CPU percent. Returns false if it was already set;
    /// the first value is kept.
    pub fn set_cpu_percent(&self, value: f64) -> bool {
        self.pcpu.set(value).is_ok()
    }

    /// Live query against the source, not the captured flag.
    pub fn is_running<S: ProcessSource + ?Sized>(&self, source: &S) -> bool {
        source.is_running(self.pid)
    }

    /// Command line as a single display string, or the short name for
    /// processes without one.
    pub fn title(&self) -> String {
        let joined = self
            .cmdline
            .iter()
            .filter(|t| !t.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            self.name.clone()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fixture::{FixtureProcess, FixtureSource};

    #[test]
    fn test_capture_reads_record() {
        let source = FixtureSource::new(vec![FixtureProcess::new(
            42,
            1,
            42,
            &["/usr/sbin/sshd", "-D"],
        )
        .with_memory(4096, 8192)
        .with_ctx_switches(3, 1)]);

        let m = ProcessMirror::capture(&source, 42);
        assert_eq!(m.pid, 42);
        assert_eq!(m.ppid, 1);
        assert_eq!(m.pgid, 42);
        assert_eq!(m.rss, 4096);
        assert_eq!(m.vms, 8192);
        assert_eq!(m.ctx_vol, 3);
        assert_eq!(m.ctx_invol, 1);
        assert!(m.running);
        assert!(!m.is_sampled());
    }

    #[test]
    fn test_capture_of_vanished_process_degrades() {
        let source = FixtureSource::new(vec![FixtureProcess::new(7, 1, 7, &["x"]).gone()]);
        let m = ProcessMirror::capture(&source, 7);
        assert_eq!(m.pid, 7);
        assert_eq!(m.ppid, 0);
        assert_eq!(m.pgid, 0);
        assert_eq!(m.rss, 0);
        assert!(m.cmdline.is_empty());
        assert!(!m.running);
        assert!(!m.is_running(&source));
    }

    #[test]
    fn test_cpu_percent_is_write_once() {
        let m = ProcessMirror::vanished(1);
        assert_eq!(m.cpu_percent(), 0.0);
        assert!(m.set_cpu_percent(12.5));
        assert!(!m.set_cpu_percent(99.0));
        assert_eq!(m.cpu_percent(), 12.5);
    }

    #[test]
    fn test_title() {
        let mut m = ProcessMirror::vanished(1);
        m.name = "kworker/0:1".to_string();
        assert_eq!(m.title(), "kworker/0:1");

        m.cmdline = vec!["php-fpm: pool main".into(), "".into(), "".into()];
        assert_eq!(m.title(), "php-fpm: pool main");
    }
}
