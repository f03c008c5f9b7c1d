//! Memory and scheduling counters from `/proc/<pid>/status`.

use std::fs;
use std::path::Path;

/// Counters read from `/proc/<pid>/status`. Missing keys stay zero
/// (kernel threads, for example, carry no `VmRSS`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounters {
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    pub ctx_voluntary: u64,
    pub ctx_involuntary: u64,
}

/// Parses kilobyte values from status file lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Parses the content of a `/proc/<pid>/status` file.
pub fn parse_status_content(content: &str) -> StatusCounters {
    let mut counters = StatusCounters::default();

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("VmRSS:") {
            counters.rss_bytes = parse_kb_value(v).unwrap_or(0) * 1024;
        } else if let Some(v) = line.strip_prefix("VmSize:") {
            counters.vms_bytes = parse_kb_value(v).unwrap_or(0) * 1024;
        } else if let Some(v) = line.strip_prefix("voluntary_ctxt_switches:") {
            counters.ctx_voluntary = parse_kb_value(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("nonvoluntary_ctxt_switches:") {
            counters.ctx_involuntary = parse_kb_value(v).unwrap_or(0);
        }
    }

    counters
}

/// Reads memory and context-switch counters from `<proc_path>/status`.
pub fn read_status(proc_path: &Path) -> Result<StatusCounters, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("status"))?;
    Ok(parse_status_content(&content))
}
