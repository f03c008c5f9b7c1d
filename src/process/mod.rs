//! Process-related modules: reading the process table and sampling it.
//!
//! This module provides:
//! - `scanner`, `stat`, `memory`: parsers for /proc entries
//! - `cpu`: delta-based CPU percent cache
//! - `source`: the `ProcessSource` seam and its procfs implementation
//! - `fixture`: a process source replaying a JSON process table
//! - `mirror`: the immutable per-process snapshot
//! - `snapshot`: the pid-indexed arena of mirrors for one scan
//! - `sampler`: the two-phase CPU percent protocol

pub mod cpu;
pub mod fixture;
pub mod memory;
pub mod mirror;
pub mod sampler;
pub mod scanner;
pub mod snapshot;
pub mod source;
pub mod stat;

// Re-export commonly used types
pub use fixture::{load_fixture, FixtureProcess, FixtureSource, ProcessFixture};
pub use mirror::ProcessMirror;
pub use sampler::{SampleReport, Sampler, DEFAULT_SAMPLE_INTERVAL};
pub use snapshot::{CaptureOptions, Snapshot};
pub use source::{ProcFs, ProcessRecord, ProcessSource};
pub use stat::CLK_TCK;
