//! Arena of mirrors for one scan, indexed by pid.
//!
//! Parent and child relations are plain pids. Every navigation goes through
//! the index; a pid that is not in the snapshot resolves to `None`.

use crate::error::ScanError;
use crate::process::mirror::ProcessMirror;
use crate::process::source::ProcessSource;
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

/// Options for capturing a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Keep only the lowest N pids.
    pub max_processes: Option<usize>,
    /// Read processes on the rayon pool.
    pub parallel: bool,
}

/// All mirrors of one scan.
pub struct Snapshot {
    mirrors: Vec<ProcessMirror>,
    index: HashMap<u32, usize>,
    idle_percent: f64,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Enumerates and reads every process of the source. Fails only when the
    /// source cannot be enumerated at all.
    pub fn capture<S: ProcessSource + ?Sized>(
        source: &S,
        options: &CaptureOptions,
    ) -> Result<Self, ScanError> {
        let mut pids = source.pids()?;
        pids.sort_unstable();
        pids.dedup();
        if let Some(max) = options.max_processes {
            pids.truncate(max);
        }

        let mirrors: Vec<ProcessMirror> = if options.parallel {
            pids.par_iter()
                .map(|&pid| ProcessMirror::capture(source, pid))
                .collect()
        } else {
            pids.iter()
                .map(|&pid| ProcessMirror::capture(source, pid))
                .collect()
        };

        let snapshot = Self::from_mirrors(mirrors);
        debug!(
            "Captured {} processes ({} not running)",
            snapshot.len(),
            snapshot.not_running_count()
        );
        Ok(snapshot)
    }

    /// Builds the arena from already captured mirrors: orders them by pid,
    /// drops duplicate pids and derives every mirror's child list from the
    /// parent pids.
    pub fn from_mirrors(mut mirrors: Vec<ProcessMirror>) -> Self {
        mirrors.sort_by_key(|m| m.pid);
        mirrors.dedup_by_key(|m| m.pid);

        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for m in &mirrors {
            if m.ppid != 0 && m.ppid != m.pid {
                children.entry(m.ppid).or_default().push(m.pid);
            }
        }

        let mirrors: Vec<ProcessMirror> = mirrors
            .into_iter()
            .map(|m| {
                // pids were visited in ascending order, so the lists are sorted
                let kids = children.remove(&m.pid).unwrap_or_default();
                m.with_children(kids)
            })
            .collect();

        let index = mirrors
            .iter()
            .enumerate()
            .map(|(slot, m)| (m.pid, slot))
            .collect();

        Self {
            mirrors,
            index,
            idle_percent: 0.0,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn mirrors(&self) -> &[ProcessMirror] {
        &self.mirrors
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessMirror> {
        self.mirrors.iter()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessMirror> {
        self.index.get(&pid).map(|&slot| &self.mirrors[slot])
    }

    /// Arena slot of a pid.
    pub fn slot_of(&self, pid: u32) -> Option<usize> {
        self.index.get(&pid).copied()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.index.contains_key(&pid)
    }

    pub fn parent(&self, mirror: &ProcessMirror) -> Option<&ProcessMirror> {
        if mirror.ppid == 0 || mirror.ppid == mirror.pid {
            return None;
        }
        self.get(mirror.ppid)
    }

    /// Children that are still present; missing pids are skipped.
    pub fn children<'a>(
        &'a self,
        mirror: &'a ProcessMirror,
    ) -> impl Iterator<Item = &'a ProcessMirror> + 'a {
        mirror.children.iter().filter_map(move |&pid| self.get(pid))
    }

    /// Host idle CPU percent measured over the sampling interval.
    pub fn idle_percent(&self) -> f64 {
        self.idle_percent
    }

    pub(crate) fn set_idle_percent(&mut self, idle_percent: f64) {
        self.idle_percent = idle_percent;
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn not_running_count(&self) -> usize {
        self.mirrors.iter().filter(|m| !m.running).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fixture::{FixtureProcess, FixtureSource};

    fn source() -> FixtureSource {
        FixtureSource::new(vec![
            FixtureProcess::new(30, 10, 10, &["worker"]),
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(10, 1, 10, &["master"]),
            FixtureProcess::new(20, 10, 10, &["worker"]),
            FixtureProcess::new(40, 99, 40, &["orphan"]),
        ])
    }

    #[test]
    fn test_capture_orders_by_pid_and_derives_children() {
        let snap = Snapshot::capture(&source(), &CaptureOptions::default()).expect("capture");
        let pids: Vec<u32> = snap.iter().map(|m| m.pid).collect();
        assert_eq!(pids, vec![1, 10, 20, 30, 40]);

        assert_eq!(snap.get(1).expect("init").children, vec![10]);
        assert_eq!(snap.get(10).expect("master").children, vec![20, 30]);
        assert!(snap.get(20).expect("worker").children.is_empty());
    }

    #[test]
    fn test_parent_lookup_miss_is_none() {
        let snap = Snapshot::capture(&source(), &CaptureOptions::default()).expect("capture");
        let orphan = snap.get(40).expect("orphan");
        assert!(snap.parent(orphan).is_none());
        let init = snap.get(1).expect("init");
        assert!(snap.parent(init).is_none());
        let worker = snap.get(20).expect("worker");
        assert_eq!(snap.parent(worker).map(|m| m.pid), Some(10));
    }

    #[test]
    fn test_children_skip_missing_pids() {
        let snap = Snapshot::from_mirrors(vec![ProcessMirror::vanished(5)]);
        let ghost = ProcessMirror::vanished(6).with_children(vec![5, 77]);
        let found: Vec<u32> = snap.children(&ghost).map(|m| m.pid).collect();
        assert_eq!(found, vec![5]);
    }

    #[test]
    fn test_parallel_capture_matches_sequential() {
        let seq = Snapshot::capture(&source(), &CaptureOptions::default()).expect("capture");
        let par = Snapshot::capture(
            &source(),
            &CaptureOptions {
                parallel: true,
                ..Default::default()
            },
        )
        .expect("capture");
        let a: Vec<(u32, Vec<u32>)> = seq.iter().map(|m| (m.pid, m.children.clone())).collect();
        let b: Vec<(u32, Vec<u32>)> = par.iter().map(|m| (m.pid, m.children.clone())).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_processes_limits_capture() {
        let snap = Snapshot::capture(
            &source(),
            &CaptureOptions {
                max_processes: Some(2),
                ..Default::default()
            },
        )
        .expect("capture");
        assert_eq!(snap.len(), 2);
        assert!(snap.contains(1));
        assert!(snap.contains(10));
    }
}
