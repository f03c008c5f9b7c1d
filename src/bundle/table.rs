//! Read-only facade over the result of one scan.
//!
//! The table owns the snapshot and the merged bundle list. Everything the
//! daemon, the CLI and the sink need goes through it; the query surface never
//! fails and answers `"0.0"` for anything it does not know.

use crate::bundle::boundary::BoundaryPredicate;
use crate::bundle::builder::{BundleBuilder, ProcBundle};
use crate::bundle::group_index::GroupIndex;
use crate::bundle::merger::merge_by_name;
use crate::process::{ProcessMirror, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Answer for unknown bundles and metrics.
pub const SENTINEL: &str = "0.0";

/// Name of the pseudo-bundle carrying the host idle CPU percent.
pub const IDLE_BUNDLE: &str = "idle";

/// Which metric names the query surface accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSet {
    /// pcpu, memrss, memvms, ctxvol, ctxinvol
    #[default]
    Standard,
    /// nconn, nfd, nfile, ctxswvol, ctxswinvol, memrss, pcpu
    Compat,
}

impl MetricSet {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            MetricSet::Standard => &["pcpu", "memrss", "memvms", "ctxvol", "ctxinvol"],
            MetricSet::Compat => &[
                "nconn",
                "nfd",
                "nfile",
                "ctxswvol",
                "ctxswinvol",
                "memrss",
                "pcpu",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Pcpu,
    MemRss,
    MemVms,
    CtxVol,
    CtxInvol,
    Connections,
    Fds,
    Files,
}

impl Metric {
    /// Resolves a metric name within the given set.
    pub fn parse(name: &str, set: MetricSet) -> Option<Metric> {
        let metric = match (set, name) {
            (_, "pcpu") => Metric::Pcpu,
            (_, "memrss") => Metric::MemRss,
            (MetricSet::Standard, "memvms") => Metric::MemVms,
            (MetricSet::Standard, "ctxvol") => Metric::CtxVol,
            (MetricSet::Standard, "ctxinvol") => Metric::CtxInvol,
            (MetricSet::Compat, "ctxswvol") => Metric::CtxVol,
            (MetricSet::Compat, "ctxswinvol") => Metric::CtxInvol,
            (MetricSet::Compat, "nconn") => Metric::Connections,
            (MetricSet::Compat, "nfd") => Metric::Fds,
            (MetricSet::Compat, "nfile") => Metric::Files,
            _ => return None,
        };
        Some(metric)
    }

    /// Canonical name in the standard set, or the compat name for metrics
    /// only the compat set has.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Pcpu => "pcpu",
            Metric::MemRss => "memrss",
            Metric::MemVms => "memvms",
            Metric::CtxVol => "ctxvol",
            Metric::CtxInvol => "ctxinvol",
            Metric::Connections => "nconn",
            Metric::Fds => "nfd",
            Metric::Files => "nfile",
        }
    }
}

/// A metric reading: counters are integers, CPU percent is a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(u64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Sums over the members of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BundleStats {
    pub members: usize,
    pub rss: u64,
    pub vms: u64,
    pub ctx_vol: u64,
    pub ctx_invol: u64,
    pub pcpu: f64,
    pub n_fds: u64,
    pub n_open_files: u64,
    pub n_sockets: u64,
}

impl BundleStats {
    fn add(&mut self, m: &ProcessMirror) {
        self.members += 1;
        self.rss += m.rss;
        self.vms += m.vms;
        self.ctx_vol += m.ctx_vol;
        self.ctx_invol += m.ctx_invol;
        self.pcpu += m.cpu_percent();
        self.n_fds += m.n_fds;
        self.n_open_files += m.n_open_files;
        self.n_sockets += m.n_sockets;
    }

    pub fn value(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::Pcpu => MetricValue::Float(self.pcpu),
            Metric::MemRss => MetricValue::Int(self.rss),
            Metric::MemVms => MetricValue::Int(self.vms),
            Metric::CtxVol => MetricValue::Int(self.ctx_vol),
            Metric::CtxInvol => MetricValue::Int(self.ctx_invol),
            Metric::Connections => MetricValue::Int(self.n_sockets),
            Metric::Fds => MetricValue::Int(self.n_fds),
            Metric::Files => MetricValue::Int(self.n_open_files),
        }
    }
}

/// One aggregated row per bundle per scan, as handed to a sample sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Unix seconds of the scan.
    pub timestamp: i64,
    pub name: String,
    pub rss: u64,
    pub vms: u64,
    pub ctx_vol: u64,
    pub ctx_invol: u64,
    pub pcpu: f64,
    pub n_fds: u64,
    pub n_open_files: u64,
    pub n_sockets: u64,
    pub members: u64,
}

impl BundleRecord {
    pub fn from_stats(timestamp: i64, name: &str, stats: &BundleStats) -> Self {
        Self {
            timestamp,
            name: name.to_string(),
            rss: stats.rss,
            vms: stats.vms,
            ctx_vol: stats.ctx_vol,
            ctx_invol: stats.ctx_invol,
            pcpu: stats.pcpu,
            n_fds: stats.n_fds,
            n_open_files: stats.n_open_files,
            n_sockets: stats.n_sockets,
            members: stats.members as u64,
        }
    }

    /// Record of the idle pseudo-bundle: only the CPU percent is set.
    pub fn idle(timestamp: i64, idle_percent: f64) -> Self {
        Self::from_stats(
            timestamp,
            IDLE_BUNDLE,
            &BundleStats {
                pcpu: idle_percent,
                ..Default::default()
            },
        )
    }

    pub fn value(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::Pcpu => MetricValue::Float(self.pcpu),
            Metric::MemRss => MetricValue::Int(self.rss),
            Metric::MemVms => MetricValue::Int(self.vms),
            Metric::CtxVol => MetricValue::Int(self.ctx_vol),
            Metric::CtxInvol => MetricValue::Int(self.ctx_invol),
            Metric::Connections => MetricValue::Int(self.n_sockets),
            Metric::Fds => MetricValue::Int(self.n_fds),
            Metric::Files => MetricValue::Int(self.n_open_files),
        }
    }
}

/// Bundles of one scan with their snapshot.
pub struct BundleTable {
    snapshot: Snapshot,
    bundles: Vec<ProcBundle>,
}

impl BundleTable {
    /// Groups, builds and merges the bundles of a sampled snapshot.
    pub fn build(snapshot: Snapshot, boundary: &dyn BoundaryPredicate) -> Self {
        let groups = GroupIndex::build(&snapshot);
        let bundles = BundleBuilder::new(&snapshot, boundary).build(&groups);
        let built = bundles.len();
        let bundles = merge_by_name(bundles);
        debug!(
            "Built {} bundles ({} after merge) from {} groups",
            built,
            bundles.len(),
            groups.len()
        );
        Self { snapshot, bundles }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn bundles(&self) -> &[ProcBundle] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Bundle names in build order.
    pub fn names(&self) -> Vec<&str> {
        self.bundles.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn bundle(&self, name: &str) -> Option<&ProcBundle> {
        self.bundles.iter().find(|b| b.name == name)
    }

    /// Members that are still in the snapshot.
    pub fn members<'a>(&'a self, bundle: &'a ProcBundle) -> impl Iterator<Item = &'a ProcessMirror> + 'a {
        bundle.members.iter().filter_map(move |&pid| self.snapshot.get(pid))
    }

    pub fn aggregate(&self, bundle: &ProcBundle) -> BundleStats {
        let mut stats = BundleStats::default();
        for m in self.members(bundle) {
            stats.add(m);
        }
        stats
    }

    pub fn stats(&self, name: &str) -> Option<BundleStats> {
        self.bundle(name).map(|b| self.aggregate(b))
    }

    pub fn rss(&self, name: &str) -> u64 {
        self.stats(name).map(|s| s.rss).unwrap_or(0)
    }

    pub fn vms(&self, name: &str) -> u64 {
        self.stats(name).map(|s| s.vms).unwrap_or(0)
    }

    pub fn ctx_vol(&self, name: &str) -> u64 {
        self.stats(name).map(|s| s.ctx_vol).unwrap_or(0)
    }

    pub fn ctx_invol(&self, name: &str) -> u64 {
        self.stats(name).map(|s| s.ctx_invol).unwrap_or(0)
    }

    pub fn pcpu(&self, name: &str) -> f64 {
        self.stats(name).map(|s| s.pcpu).unwrap_or(0.0)
    }

    /// Host idle CPU percent over the sampling interval.
    pub fn idle_percent(&self) -> f64 {
        self.snapshot.idle_percent()
    }

    pub fn timestamp(&self) -> i64 {
        self.snapshot.captured_at().timestamp()
    }

    /// Union of the `n` largest bundles by each metric of the set, in build
    /// order. Ties keep build order.
    pub fn top(&self, n: usize, set: MetricSet) -> Vec<&ProcBundle> {
        let stats: Vec<BundleStats> = self.bundles.iter().map(|b| self.aggregate(b)).collect();
        let mut picked = vec![false; self.bundles.len()];

        for name in set.names() {
            let Some(metric) = Metric::parse(name, set) else {
                continue;
            };
            let mut order: Vec<usize> = (0..self.bundles.len()).collect();
            order.sort_by(|&a, &b| {
                stats[b]
                    .value(metric)
                    .as_f64()
                    .total_cmp(&stats[a].value(metric).as_f64())
            });
            for i in order.into_iter().take(n) {
                picked[i] = true;
            }
        }

        self.bundles
            .iter()
            .zip(picked)
            .filter_map(|(b, keep)| keep.then_some(b))
            .collect()
    }

    /// One record per bundle, stamped with the scan time.
    pub fn records(&self) -> Vec<BundleRecord> {
        let ts = self.timestamp();
        self.bundles
            .iter()
            .map(|b| BundleRecord::from_stats(ts, &b.name, &self.aggregate(b)))
            .collect()
    }

    /// Typed lookup. `None` for unknown bundles and metrics outside the set.
    pub fn metric(&self, bundle: &str, metric: &str, set: MetricSet) -> Option<MetricValue> {
        let metric = Metric::parse(metric, set)?;
        match self.stats(bundle) {
            Some(stats) => Some(stats.value(metric)),
            None if bundle == IDLE_BUNDLE && metric == Metric::Pcpu => {
                Some(MetricValue::Float(self.idle_percent()))
            }
            None => None,
        }
    }

    /// String answer for monitoring checks; never fails.
    pub fn query(&self, bundle: &str, metric: &str, set: MetricSet) -> String {
        self.metric(bundle, metric, set)
            .map(|v| v.to_string())
            .unwrap_or_else(|| SENTINEL.to_string())
    }
}
