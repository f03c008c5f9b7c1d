//! Host-wide CPU counters from the /proc filesystem.
//!
//! The sampler reads the aggregate `cpu` line of `/proc/stat` before and after
//! its sampling interval; the idle share of that window is the host idle
//! percent reported next to the bundles.

use std::fs;
use std::path::Path;

/// CPU statistics for calculating usage ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Calculate non-active time (idle + iowait).
    /// This includes both true idle time and time spent waiting for I/O operations.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Parses one `cpu...` line of /proc/stat.
///
/// Returns None for lines that are not CPU lines or carry fewer than seven
/// counters.
pub fn parse_cpu_line(line: &str) -> Option<(String, CpuStat)> {
    if !line.starts_with("cpu") {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }

    let field = |i: usize| -> u64 {
        parts
            .get(i)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    Some((
        parts[0].to_string(),
        CpuStat {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            steal: field(8),
        },
    ))
}

/// Reads the aggregate CPU counters (the `cpu` line) from `<proc_root>/stat`.
pub fn read_cpu_stat(proc_root: &Path) -> Result<CpuStat, String> {
    let path = proc_root.join("stat");
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    content
        .lines()
        .filter_map(parse_cpu_line)
        .find(|(name, _)| name == "cpu")
        .map(|(_, stat)| stat)
        .ok_or_else(|| format!("No aggregate cpu line found in {}", path.display()))
}

/// Idle percent (0..=100) of the window between two readings.
///
/// Returns 0.0 when no ticks elapsed or the counters went backwards.
pub fn idle_percent(before: &CpuStat, after: &CpuStat) -> f64 {
    let delta_total = after.total().saturating_sub(before.total());
    if delta_total == 0 {
        return 0.0;
    }
    let delta_idle = after.idle_total().saturating_sub(before.idle_total());
    (delta_idle as f64 / delta_total as f64) * 100.0
}

/// Reads system uptime from /proc/uptime.
///
/// Returns uptime in seconds.
/// Format: "<uptime_seconds> <idle_seconds>"
pub fn read_uptime(proc_root: &Path) -> Result<f64, String> {
    let path = proc_root.join("uptime");
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.is_empty() {
        return Err("Invalid /proc/uptime format: no fields found".to_string());
    }

    parts[0]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse uptime: {}", e))
}
