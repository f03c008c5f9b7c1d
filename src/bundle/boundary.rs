//! Kernel-boundary detection.
//!
//! Tree walks never climb past, and never absorb, a boundary process. On
//! Linux kernel threads carry process group 0; other systems differ, so the
//! rule is a predicate rather than a constant.

use crate::process::ProcessMirror;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decides whether a mirror sits on the kernel boundary.
pub trait BoundaryPredicate: Send + Sync {
    fn is_boundary(&self, mirror: &ProcessMirror) -> bool;
}

impl<F> BoundaryPredicate for F
where
    F: Fn(&ProcessMirror) -> bool + Send + Sync,
{
    fn is_boundary(&self, mirror: &ProcessMirror) -> bool {
        self(mirror)
    }
}

/// Built-in boundary rules, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KernelBoundary {
    /// Process group 0 only.
    PgidZero,
    /// Process group 0, or a forest root (parent pid 0) such as init.
    #[default]
    PgidZeroOrRoot,
}

impl BoundaryPredicate for KernelBoundary {
    fn is_boundary(&self, mirror: &ProcessMirror) -> bool {
        match self {
            KernelBoundary::PgidZero => mirror.pgid == 0,
            KernelBoundary::PgidZeroOrRoot => mirror.pgid == 0 || mirror.ppid == 0,
        }
    }
}

impl fmt::Display for KernelBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelBoundary::PgidZero => write!(f, "pgid-zero"),
            KernelBoundary::PgidZeroOrRoot => write!(f, "pgid-zero-or-root"),
        }
    }
}

impl FromStr for KernelBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pgid-zero" => Ok(KernelBoundary::PgidZero),
            "pgid-zero-or-root" => Ok(KernelBoundary::PgidZeroOrRoot),
            other => Err(format!(
                "unknown kernel boundary '{}' (expected pgid-zero or pgid-zero-or-root)",
                other
            )),
        }
    }
}
