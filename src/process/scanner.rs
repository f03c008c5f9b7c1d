//! Process scanning utilities for discovering and reading process entries from /proc.
//!
//! This module provides functions to scan the /proc filesystem for process entries
//! and read per-process details that are not part of `stat` or `status`.

use std::fs;
use std::path::{Path, PathBuf};

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Descriptor counts of one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdCounts {
    pub total: u64,
    pub regular_files: u64,
    pub sockets: u64,
}

/// Scans /proc directory for process entries with numeric PIDs.
///
/// Failing to list the directory itself is the only error; unreadable
/// entries are skipped.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Result<Vec<ProcEntry>, std::io::Error> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: u32 = match name.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        out.push(ProcEntry { pid, proc_path: p });
    }

    out.sort_unstable_by_key(|e| e.pid);
    if let Some(maxp) = max {
        out.truncate(maxp);
    }
    Ok(out)
}

/// Reads process name from the comm file.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    let s = fs::read_to_string(proc_path.join("comm")).ok()?;
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.into())
    }
}

/// Splits raw `cmdline` bytes into tokens.
///
/// Tokens are NUL separated and the buffer normally ends with one NUL.
/// Empty tokens in the middle are kept: processes that rewrite their own
/// title leave runs of NUL bytes behind, which the namer relies on.
pub fn split_cmdline(content: &[u8]) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let data = content.strip_suffix(&[0u8]).unwrap_or(content);
    data.split(|&b| b == 0u8)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Reads the command-line tokens of a process. Kernel threads have none.
pub fn read_cmdline(proc_path: &Path) -> Result<Vec<String>, std::io::Error> {
    let content = fs::read(proc_path.join("cmdline"))?;
    Ok(split_cmdline(&content))
}

/// Counts open descriptors, split into regular files and sockets.
pub fn count_fds(proc_path: &Path) -> Result<FdCounts, std::io::Error> {
    let mut counts = FdCounts::default();
    for entry in fs::read_dir(proc_path.join("fd"))?.flatten() {
        counts.total += 1;
        let path = entry.path();
        match fs::read_link(&path) {
            Ok(target) if target.to_string_lossy().starts_with("socket:") => {
                counts.sockets += 1;
            }
            Ok(_) => {
                if fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
                    counts.regular_files += 1;
                }
            }
            Err(_) => {}
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // -------------------------------------------------------------------------
    // Tests for split_cmdline
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_cmdline_regular() {
        let tokens = split_cmdline(b"/usr/sbin/nginx\0-g\0daemon off;\0");
        assert_eq!(tokens, vec!["/usr/sbin/nginx", "-g", "daemon off;"]);
    }

    #[test]
    fn test_split_cmdline_keeps_title_padding() {
        let tokens = split_cmdline(b"zaggregator\0\0\0\0\0");
        assert_eq!(tokens, vec!["zaggregator", "", "", "", ""]);
    }

    #[test]
    fn test_split_cmdline_without_trailing_nul() {
        let tokens = split_cmdline(b"postgres: writer process   ");
        assert_eq!(tokens, vec!["postgres: writer process   "]);
    }

    #[test]
    fn test_split_cmdline_empty() {
        assert!(split_cmdline(b"").is_empty());
    }

    // -------------------------------------------------------------------------
    // Tests for collect_proc_entries
    // -------------------------------------------------------------------------

    #[test]
    fn test_collect_proc_entries_numeric_only_sorted() {
        let dir = tempdir().expect("Failed to create temp dir");
        for name in ["300", "12", "self", "sys", "7"] {
            std::fs::create_dir(dir.path().join(name)).expect("mkdir");
        }

        let entries = collect_proc_entries(dir.path(), None).expect("readable root");
        let pids: Vec<u32> = entries.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![7, 12, 300]);

        let limited = collect_proc_entries(dir.path(), Some(2)).expect("readable root");
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_collect_proc_entries_missing_root_is_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(collect_proc_entries(&dir.path().join("nope"), None).is_err());
    }

    #[test]
    fn test_read_process_name() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("comm"), "sshd\n").expect("write comm");
        assert_eq!(read_process_name(dir.path()), Some("sshd".to_string()));

        std::fs::write(dir.path().join("comm"), "\n").expect("write comm");
        assert_eq!(read_process_name(dir.path()), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_count_fds() {
        let dir = tempdir().expect("Failed to create temp dir");
        let fd_dir = dir.path().join("fd");
        std::fs::create_dir(&fd_dir).expect("mkdir fd");

        let regular = dir.path().join("data.log");
        std::fs::write(&regular, "x").expect("write file");
        std::os::unix::fs::symlink(&regular, fd_dir.join("3")).expect("symlink");
        std::os::unix::fs::symlink("socket:[12345]", fd_dir.join("4")).expect("symlink");
        std::os::unix::fs::symlink("pipe:[777]", fd_dir.join("5")).expect("symlink");

        let counts = count_fds(dir.path()).expect("fd dir readable");
        assert_eq!(counts.total, 3);
        assert_eq!(counts.regular_files, 1);
        assert_eq!(counts.sockets, 1);
    }
}
