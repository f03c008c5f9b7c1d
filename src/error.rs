//! Error types shared by the scan pipeline.
//!
//! Per-process faults (`ProcessError`) are absorbed where they occur and
//! degrade to zero/empty values. `ScanError` is the only error that aborts a
//! scan. Lookup misses in the pid index are plain `Option::None`.

use std::path::PathBuf;
use thiserror::Error;

/// Fault while reading a single process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("process {0} is gone")]
    Gone(u32),

    #[error("access to process {0} denied")]
    AccessDenied(u32),

    #[error("malformed proc entry for process {pid}: {reason}")]
    Malformed { pid: u32, reason: String },
}

impl ProcessError {
    /// Maps an I/O error from a `/proc/<pid>/...` read onto the process fault taxonomy.
    pub fn from_io(pid: u32, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ProcessError::Gone(pid),
            std::io::ErrorKind::PermissionDenied => ProcessError::AccessDenied(pid),
            _ => ProcessError::Malformed {
                pid,
                reason: err.to_string(),
            },
        }
    }
}

/// Fatal scan failure.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot enumerate processes under {}: {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid process fixture {}: {reason}", path.display())]
    Fixture { path: PathBuf, reason: String },
}

/// Sample store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sample store is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_maps_not_found_to_gone() {
        let err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        assert_eq!(ProcessError::from_io(42, &err), ProcessError::Gone(42));
    }

    #[test]
    fn test_from_io_maps_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ProcessError::from_io(7, &err),
            ProcessError::AccessDenied(7)
        );
    }

    #[test]
    fn test_from_io_other_is_malformed() {
        let err = io::Error::other("garbage");
        match ProcessError::from_io(9, &err) {
            ProcessError::Malformed { pid, reason } => {
                assert_eq!(pid, 9);
                assert!(reason.contains("garbage"));
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }
}
