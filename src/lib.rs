//! zaggregator library
//!
//! Collapses the process table into bundles: sets of processes that belong
//! to one workload (a database with its workers, a daemon with its children,
//! the kernel threads). Each scan captures an immutable snapshot of every
//! process, samples CPU usage once for the whole batch, reconstructs family
//! trees from process groups and parent links, names every tree and merges
//! trees sharing a name.
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//! use zaggregator::process::{FixtureProcess, FixtureSource};
//! use zaggregator::scan::{scan, ScanConfig};
//! use zaggregator::bundle::MetricSet;
//!
//! let source = FixtureSource::new(vec![
//!     FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
//!     FixtureProcess::new(10, 1, 10, &["/usr/sbin/cron", "-f"]).with_memory(4096, 8192),
//! ]);
//! let config = ScanConfig {
//!     sample_interval: Duration::ZERO,
//!     ..Default::default()
//! };
//!
//! let table = scan(&source, &config).expect("scan");
//! assert_eq!(table.query("cron", "memrss", MetricSet::Standard), "4096");
//! assert_eq!(table.query("no-such-bundle", "pcpu", MetricSet::Standard), "0.0");
//! ```

pub mod bundle;
pub mod discovery;
pub mod error;
pub mod health_stats;
pub mod process;
pub mod ringbuffer;
pub mod sample_store;
pub mod scan;
pub mod system;

// Re-export main types for convenience
pub use bundle::{BundleRecord, BundleTable, KernelBoundary, MetricSet, ProcBundle};
pub use error::{ProcessError, ScanError, StoreError};
pub use sample_store::{RetentionConfig, SampleSink, SampleStore};
pub use scan::{scan, ScanConfig};
