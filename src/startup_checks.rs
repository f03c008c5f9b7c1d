//! Startup requirement validation for zaggregator.
//!
//! This module validates that the aggregator has all necessary permissions
//! and system requirements before starting.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};
use zaggregator::system::read_cpu_stat;

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_mounted(proc_root)?;
    check_host_cpu_stat(proc_root)?;
    check_fd_access(proc_root)?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - descriptor counts of foreign processes will be 0");
        warn!("   Recommendation: Run as root for complete bundles");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

fn check_proc_mounted(proc_root: &Path) -> Result<(), ValidationError> {
    if proc_root.join("self").exists() || proc_root.join("1").exists() {
        info!("✅ procfs found at {}", proc_root.display());
        Ok(())
    } else {
        error!("❌ No procfs at {}", proc_root.display());
        Err(ValidationError::ProcNotMounted(proc_root.display().to_string()))
    }
}

/// The host idle share is read from the aggregate cpu line.
fn check_host_cpu_stat(proc_root: &Path) -> Result<(), ValidationError> {
    match read_cpu_stat(proc_root) {
        Ok(_) => {
            info!("✅ {}/stat readable", proc_root.display());
            Ok(())
        }
        Err(e) => {
            error!("❌ Cannot read host CPU counters: {}", e);
            Err(ValidationError::CpuStatUnreadable(e))
        }
    }
}

/// Descriptor counts need access to /proc/<pid>/fd of other users.
fn check_fd_access(proc_root: &Path) -> Result<(), ValidationError> {
    let test_dir = proc_root.join("1").join("fd");

    match fs::read_dir(&test_dir) {
        Ok(_) => {
            info!("✅ /proc access: Can read descriptors of all processes");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", test_dir.display());
            error!("   Open file and socket counts will only cover user-owned processes!");
            error!("");
            error!("   Solutions:");
            error!("   1. Run as root");
            error!("   2. Grant capabilities:");
            error!("      setcap cap_dac_read_search,cap_sys_ptrace+ep /path/to/binary");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("⚠️  Could not test /proc access: {}", e);
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("procfs not mounted at {0}")]
    ProcNotMounted(String),

    #[error("host CPU counters unreadable: {0}")]
    CpuStatUnreadable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_proc_root_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = validate_requirements(&dir.path().join("nope"));
        assert!(matches!(result, Err(ValidationError::ProcNotMounted(_))));
    }

    #[test]
    fn test_fake_proc_root_passes() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("1").join("fd")).expect("mkdir");
        fs::write(
            dir.path().join("stat"),
            "cpu  100 0 50 800 10 0 5 0 0 0\ncpu0 100 0 50 800 10 0 5 0 0 0\n",
        )
        .expect("write");
        assert!(validate_requirements(dir.path()).is_ok());
    }

    #[test]
    fn test_unreadable_cpu_stat_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("1")).expect("mkdir");
        let result = validate_requirements(dir.path());
        assert!(matches!(result, Err(ValidationError::CpuStatUnreadable(_))));
    }
}
