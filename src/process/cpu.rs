//! Delta-based CPU percent per process.
//!
//! A reading is "percent of one core since the previous reading of the same
//! pid". The first reading of a pid only stores the baseline and reports 0.0,
//! which is exactly what the sampler's prime pass needs.

use ahash::AHashMap as HashMap;
use std::sync::RwLock as StdRwLock;
use std::time::Instant;

/// Cached CPU statistics for a single process (monotonic CPU time + last computed percent).
#[derive(Clone, Copy, Debug)]
pub struct CpuStat {
    pub cpu_percent: f64,
    pub cpu_time_seconds: f64,
}

/// Cache entry with timestamp for delta-based CPU calculation.
pub struct CpuEntry {
    pub stat: CpuStat,
    pub last_updated: Instant,
}

/// Per-source cache of the last CPU time seen for every pid.
#[derive(Default)]
pub struct CpuTracker {
    cache: StdRwLock<HashMap<u32, CpuEntry>>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `cpu_time_seconds` for `pid` and returns the percent since the
    /// previous record.
    pub fn observe(&self, pid: u32, cpu_time_seconds: f64) -> CpuStat {
        self.observe_at(pid, cpu_time_seconds, Instant::now())
    }

    fn observe_at(&self, pid: u32, cpu_time_seconds: f64, now: Instant) -> CpuStat {
        let mut cpu_percent = 0.0;

        {
            let cache_read = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache_read.get(&pid) {
                let dt = now.duration_since(entry.last_updated).as_secs_f64();
                if dt > 0.0 {
                    let delta_cpu = cpu_time_seconds - entry.stat.cpu_time_seconds;
                    if delta_cpu > 0.0 {
                        cpu_percent = (delta_cpu / dt) * 100.0;
                    }
                }
            }
        }

        let stat = CpuStat {
            cpu_percent,
            cpu_time_seconds,
        };

        self.cache.write().unwrap_or_else(|e| e.into_inner()).insert(
            pid,
            CpuEntry {
                stat,
                last_updated: now,
            },
        );

        stat
    }

    /// Drops the baseline of a pid that is gone.
    pub fn forget(&self, pid: u32) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pid);
    }

    /// Keeps only the baselines of pids for which `keep` holds.
    pub fn retain(&self, keep: impl Fn(u32) -> bool) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|pid, _| keep(*pid));
    }

    /// Number of pids with a stored baseline.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
