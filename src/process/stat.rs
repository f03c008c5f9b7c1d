//! Parsing of `/proc/<pid>/stat`.
//!
//! The identity fields (parent pid, process group) and the CPU time counters
//! come from this single file. The command name is enclosed in parentheses
//! and may itself contain spaces or parentheses, so fields are counted from
//! the last `)`.

use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Fields of `/proc/<pid>/stat` used by the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct StatFields {
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub pgrp: u32,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
}

impl StatFields {
    /// Total CPU time (user+system) in seconds.
    pub fn cpu_time_seconds(&self) -> f64 {
        (self.utime_ticks + self.stime_ticks) as f64 / *CLK_TCK
    }

    /// Zombies have released their resources and no longer count as running.
    pub fn is_zombie(&self) -> bool {
        self.state == 'Z' || self.state == 'X'
    }
}

/// Parses the content of a `/proc/<pid>/stat` file.
pub fn parse_stat_content(content: &str) -> Result<StatFields, std::io::Error> {
    let open = content
        .find('(')
        .ok_or_else(|| std::io::Error::other("Invalid stat format: missing '('"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| std::io::Error::other("Invalid stat format: missing ')'"))?;
    if close < open {
        return Err(std::io::Error::other("Invalid stat format"));
    }

    let comm = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // state ppid pgrp session tty_nr tpgid flags minflt cminflt majflt cmajflt utime stime
    if rest.len() < 13 {
        return Err(std::io::Error::other("Invalid stat format"));
    }

    let state = rest[0].chars().next().unwrap_or('?');
    let ppid: u32 = rest[1]
        .parse()
        .map_err(|_| std::io::Error::other("Failed to parse ppid field"))?;
    let pgrp: u32 = rest[2]
        .parse()
        .map_err(|_| std::io::Error::other("Failed to parse pgrp field"))?;
    let utime_ticks: u64 = rest[11].parse().unwrap_or(0);
    let stime_ticks: u64 = rest[12].parse().unwrap_or(0);

    Ok(StatFields {
        comm,
        state,
        ppid,
        pgrp,
        utime_ticks,
        stime_ticks,
    })
}

/// Reads and parses `<proc_path>/stat`.
pub fn read_stat(proc_path: &Path) -> Result<StatFields, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    parse_stat_content(&content)
}
