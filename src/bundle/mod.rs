//! Bundle engine: from a sampled snapshot to named, merged bundles.
//!
//! - `group_index`: processes partitioned by process group, largest first
//! - `boundary`: the kernel-boundary predicate
//! - `builder`: family-tree reconstruction and leader selection
//! - `namer`, `similarity`: bundle names from command lines
//! - `merger`: one bundle per name
//! - `table`: aggregates and the query surface

pub mod boundary;
pub mod builder;
pub mod group_index;
pub mod merger;
pub mod namer;
pub mod similarity;
pub mod table;

pub use boundary::{BoundaryPredicate, KernelBoundary};
pub use builder::{BundleBuilder, ProcBundle};
pub use group_index::{GroupIndex, ProcessGroup};
pub use merger::merge_by_name;
pub use namer::{derive_bundle_name, is_interpreter, name_from_cmdargs, KERNEL_BUNDLE};
pub use table::{
    BundleRecord, BundleStats, BundleTable, Metric, MetricSet, MetricValue, IDLE_BUNDLE, SENTINEL,
};
