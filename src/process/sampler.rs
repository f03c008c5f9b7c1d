//! Two-phase CPU percent sampling.
//!
//! CPU usage needs a baseline and a delta. The whole batch is primed, the
//! sampler sleeps once, and the whole batch is read again, so every process
//! shares the same denominator. The host idle share is measured over the
//! same window.

use crate::process::snapshot::Snapshot;
use crate::process::source::ProcessSource;
use crate::system::idle_percent;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default sampling interval.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Outcome of one sampling run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    pub sampled: usize,
    /// Processes running at capture but gone at the delta read; they got 0.0.
    pub exited: usize,
    pub idle_percent: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    interval: Duration,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

impl Sampler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Assigns a CPU percent to every mirror and stores the host idle percent
    /// in the snapshot. Blocks for the sampling interval.
    #[instrument(skip(self, source, snapshot), fields(processes = snapshot.len()))]
    pub fn sample<S: ProcessSource + ?Sized>(
        &self,
        source: &S,
        snapshot: &mut Snapshot,
    ) -> SampleReport {
        let host_before = source.host_cpu_times();

        for m in snapshot.iter().filter(|m| m.running) {
            // baseline only
            let _ = source.cpu_percent(m.pid);
        }

        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }

        let mut exited = 0;
        for m in snapshot.iter() {
            if !m.running {
                // gone or zombie at capture, already counted by the snapshot
                m.set_cpu_percent(0.0);
                continue;
            }
            let pcpu = match source.cpu_percent(m.pid) {
                Ok(v) => v,
                Err(e) => {
                    debug!("No CPU delta for pid {}: {}", m.pid, e);
                    exited += 1;
                    0.0
                }
            };
            m.set_cpu_percent(pcpu);
        }
        // baselines never outlive the scan that took them
        source.retain_cpu_baselines(&|pid| snapshot.contains(pid));

        let idle = match (host_before, source.host_cpu_times()) {
            (Some(before), Some(after)) => idle_percent(&before, &after),
            _ => 0.0,
        };
        snapshot.set_idle_percent(idle);

        SampleReport {
            sampled: snapshot.len(),
            exited,
            idle_percent: idle,
        }
    }
}
