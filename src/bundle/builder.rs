//! Bundle construction: family trees from process groups.
//!
//! Groups are processed largest first. Each group with unclaimed members
//! seeds a bundle, absorbs its single-child ancestor chain, picks a leader by
//! walking to the top of its tree and back down, and absorbs the leader's
//! subtree. Every walk is bounded by the snapshot size and a visited set.

use crate::bundle::boundary::BoundaryPredicate;
use crate::bundle::group_index::{GroupIndex, ProcessGroup};
use crate::bundle::namer::derive_bundle_name;
use crate::process::{ProcessMirror, Snapshot};
use ahash::AHashSet as HashSet;
use serde::Serialize;
use tracing::{debug, warn};

/// Upper bound on passes over the group list.
pub const MAX_BUILD_PASSES: usize = 4;

/// A named set of processes treated as one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcBundle {
    pub name: String,
    /// Pid the name and subtree expansion were derived from.
    pub leader: u32,
    pub members: Vec<u32>,
}

impl ProcBundle {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.members.contains(&pid)
    }
}

/// Builds the bundle set of one snapshot. Owns the claimed set.
pub struct BundleBuilder<'a> {
    snapshot: &'a Snapshot,
    boundary: &'a dyn BoundaryPredicate,
    claimed: Vec<bool>,
    remaining: usize,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(snapshot: &'a Snapshot, boundary: &'a dyn BoundaryPredicate) -> Self {
        Self {
            snapshot,
            boundary,
            claimed: vec![false; snapshot.len()],
            remaining: snapshot.len(),
        }
    }

    /// Runs the group passes until every mirror is claimed, then wraps any
    /// leftover mirror into its own bundle.
    pub fn build(mut self, groups: &GroupIndex) -> Vec<ProcBundle> {
        let mut bundles = Vec::new();

        for pass in 0..MAX_BUILD_PASSES {
            let before = self.remaining;
            for group in groups.groups() {
                if self.remaining == 0 {
                    break;
                }
                if let Some(bundle) = self.build_group(group) {
                    bundles.push(bundle);
                }
            }
            debug!(
                "Bundle pass {} left {} of {} processes unclaimed",
                pass,
                self.remaining,
                self.snapshot.len()
            );
            if self.remaining == 0 || self.remaining == before {
                break;
            }
        }

        if self.remaining > 0 {
            let snapshot = self.snapshot;
            for m in snapshot.iter() {
                if self.claim(m.pid) {
                    warn!("Process {} was not reached by any group walk", m.pid);
                    let members = vec![m.pid];
                    let name = derive_bundle_name(snapshot, m, &members, self.boundary);
                    bundles.push(ProcBundle {
                        name,
                        leader: m.pid,
                        members,
                    });
                }
            }
        }

        bundles
    }

    fn is_claimed(&self, pid: u32) -> bool {
        self.snapshot
            .slot_of(pid)
            .map(|slot| self.claimed[slot])
            .unwrap_or(true)
    }

    /// Marks a pid claimed. Returns false if it already was, or is unknown.
    fn claim(&mut self, pid: u32) -> bool {
        match self.snapshot.slot_of(pid) {
            Some(slot) if !self.claimed[slot] => {
                self.claimed[slot] = true;
                self.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn build_group(&mut self, group: &ProcessGroup) -> Option<ProcBundle> {
        let snapshot = self.snapshot;
        let seeds: Vec<u32> = group
            .members
            .iter()
            .copied()
            .filter(|&pid| !self.is_claimed(pid))
            .collect();

        let first = match seeds.first().and_then(|&pid| snapshot.get(pid)) {
            Some(m) => m,
            None => {
                debug!("Group {} has no unclaimed members, skipping", group.pgid);
                return None;
            }
        };

        let mut members = Vec::with_capacity(seeds.len());
        for pid in seeds {
            if self.claim(pid) {
                members.push(pid);
            }
        }

        self.absorb_ancestors(first, &mut members);

        let top = self.go_top(first);
        let leader = self.go_bottom(top, group.pgid);

        if !self.boundary.is_boundary(leader) {
            if self.claim(leader.pid) {
                members.push(leader.pid);
            }
            self.absorb_descendants(leader, &mut members);
        }

        let name = derive_bundle_name(snapshot, leader, &members, self.boundary);
        debug!(
            "Group {} -> bundle '{}' led by {} with {} members",
            group.pgid,
            name,
            leader.pid,
            members.len()
        );

        Some(ProcBundle {
            name,
            leader: leader.pid,
            members,
        })
    }

    /// Climbs while the parent has the current node as its only child.
    fn absorb_ancestors(&mut self, start: &'a ProcessMirror, members: &mut Vec<u32>) {
        let snapshot = self.snapshot;
        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(start.pid);
        let mut current = start;

        for _ in 0..snapshot.len() {
            let parent = match snapshot.parent(current) {
                Some(p) => p,
                None => break,
            };
            if self.boundary.is_boundary(parent)
                || parent.children.len() != 1
                || !visited.insert(parent.pid)
            {
                break;
            }
            if !self.claim(parent.pid) {
                break;
            }
            members.push(parent.pid);
            current = parent;
        }
    }

    /// Highest ancestor below the kernel boundary.
    fn go_top(&self, start: &'a ProcessMirror) -> &'a ProcessMirror {
        let snapshot = self.snapshot;
        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(start.pid);
        let mut current = start;

        for _ in 0..snapshot.len() {
            match snapshot.parent(current) {
                Some(p) if !self.boundary.is_boundary(p) && visited.insert(p.pid) => {
                    current = p;
                }
                _ => break,
            }
        }
        current
    }

    /// Descends single-child links until reaching the group, a branch point
    /// or a leaf.
    fn go_bottom(&self, top: &'a ProcessMirror, pgid: u32) -> &'a ProcessMirror {
        let snapshot = self.snapshot;
        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(top.pid);
        let mut current = top;

        for _ in 0..snapshot.len() {
            if current.pgid == pgid || current.children.len() != 1 {
                break;
            }
            match snapshot.get(current.children[0]) {
                Some(child) if visited.insert(child.pid) => current = child,
                _ => break,
            }
        }
        current
    }

    /// Claims every unclaimed, non-boundary process below the leader.
    fn absorb_descendants(&mut self, leader: &'a ProcessMirror, members: &mut Vec<u32>) {
        let snapshot = self.snapshot;
        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(leader.pid);
        let mut stack: Vec<&ProcessMirror> = snapshot.children(leader).collect();

        while let Some(m) = stack.pop() {
            if !visited.insert(m.pid) || self.boundary.is_boundary(m) {
                continue;
            }
            if self.claim(m.pid) {
                members.push(m.pid);
            }
            stack.extend(snapshot.children(m));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::boundary::KernelBoundary;
    use crate::process::{CaptureOptions, FixtureProcess, FixtureSource};

    fn snapshot(processes: Vec<FixtureProcess>) -> Snapshot {
        Snapshot::capture(&FixtureSource::new(processes), &CaptureOptions::default())
            .expect("capture")
    }

    fn build(snap: &Snapshot, boundary: KernelBoundary) -> Vec<ProcBundle> {
        let groups = GroupIndex::build(snap);
        BundleBuilder::new(snap, &boundary).build(&groups)
    }

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_unreached_process_gets_its_own_bundle() {
        let snap = snapshot(vec![
            FixtureProcess::new(500, 4242, 500, &["/usr/sbin/cron", "-f"]),
            FixtureProcess::new(501, 500, 500, &["/bin/sh", "-c", "backup.sh"]),
            FixtureProcess::new(700, 4243, 700, &["/usr/bin/orphan"]),
        ]);
        let groups = GroupIndex::build(&snap).without(700);
        assert_eq!(groups.len(), 1);

        let bundles = BundleBuilder::new(&snap, &KernelBoundary::PgidZero).build(&groups);
        assert_eq!(bundles.len(), 2);

        let orphan = bundles.iter().find(|b| b.contains(700)).expect("fallback bundle");
        assert_eq!(orphan.members, vec![700]);
        assert_eq!(orphan.leader, 700);
        assert_eq!(orphan.name, "orphan");

        let cron = bundles.iter().find(|b| b.contains(500)).expect("cron bundle");
        assert_eq!(sorted(cron.members.clone()), vec![500, 501]);
    }

    #[test]
    fn test_single_child_chain_becomes_one_bundle() {
        let snap = snapshot(vec![
            FixtureProcess::new(2, 0, 0, &[]).with_name("kthreadd"),
            FixtureProcess::new(100, 2, 300, &["/opt/a"]),
            FixtureProcess::new(200, 100, 200, &["/opt/b"]),
            FixtureProcess::new(300, 200, 100, &["/opt/c"]),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZero);

        let chain: Vec<&ProcBundle> = bundles.iter().filter(|b| b.contains(100)).collect();
        assert_eq!(chain.len(), 1);
        assert_eq!(sorted(chain[0].members.clone()), vec![100, 200, 300]);
    }

    #[test]
    fn test_branch_point_becomes_leader_of_whole_tree() {
        let snap = snapshot(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(10, 1, 10, &["/usr/sbin/sshd", "-D"]),
            FixtureProcess::new(20, 10, 20, &["sshd: alice [priv]"]),
            FixtureProcess::new(21, 20, 20, &["sshd: alice@pts/0"]),
            FixtureProcess::new(30, 10, 30, &["sshd: bob [priv]"]),
            FixtureProcess::new(31, 30, 30, &["sshd: bob@pts/1"]),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZeroOrRoot);

        let sshd = bundles.iter().find(|b| b.contains(20)).expect("sshd");
        assert_eq!(sshd.leader, 10);
        assert_eq!(sshd.name, "sshd");
        assert_eq!(sorted(sshd.members.clone()), vec![10, 20, 21, 30, 31]);
        // init is a forest root here and stays out of the daemon's bundle
        assert!(!sshd.contains(1));
    }

    #[test]
    fn test_leader_subtree_absorbs_other_groups() {
        let snap = snapshot(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(500, 1, 500, &["/usr/sbin/apache2", "-k", "start"]),
            FixtureProcess::new(501, 500, 500, &["/usr/sbin/apache2", "-k", "start"]),
            FixtureProcess::new(502, 500, 500, &["/usr/sbin/apache2", "-k", "start"]),
            FixtureProcess::new(510, 500, 510, &["/usr/bin/rotatelogs", "/var/log/x"]),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZeroOrRoot);

        let apache = bundles.iter().find(|b| b.contains(500)).expect("apache");
        assert_eq!(sorted(apache.members.clone()), vec![500, 501, 502, 510]);
        assert_eq!(apache.leader, 500);
    }

    #[test]
    fn test_kernel_threads_form_kernel_bundle() {
        let snap = snapshot(vec![
            FixtureProcess::new(2, 0, 0, &[]).with_name("kthreadd"),
            FixtureProcess::new(3, 2, 0, &[]).with_name("rcu_gp"),
            FixtureProcess::new(4, 2, 0, &[]).with_name("kworker/0:0"),
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZero);

        let kernel: Vec<&ProcBundle> = bundles.iter().filter(|b| b.name == "kernel").collect();
        assert_eq!(kernel.len(), 1);
        assert_eq!(sorted(kernel[0].members.clone()), vec![2, 3, 4]);
    }

    #[test]
    fn test_every_mirror_claimed_exactly_once() {
        let snap = snapshot(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(2, 0, 0, &[]).with_name("kthreadd"),
            FixtureProcess::new(3, 2, 0, &[]).with_name("ksoftirqd/0"),
            FixtureProcess::new(40, 1, 40, &["/usr/sbin/cron", "-f"]),
            FixtureProcess::new(41, 40, 41, &["/bin/sh", "-c", "backup.sh"]),
            FixtureProcess::new(42, 41, 41, &["/usr/bin/tar", "czf", "x.tgz"]),
            FixtureProcess::new(77, 999, 77, &["orphan-of-missing-parent"]),
            FixtureProcess::new(78, 77, 77, &["orphan-child"]),
        ]);
        for boundary in [KernelBoundary::PgidZero, KernelBoundary::PgidZeroOrRoot] {
            let bundles = build(&snap, boundary);
            let mut all: Vec<u32> = bundles.iter().flat_map(|b| b.members.clone()).collect();
            all.sort_unstable();
            let expected: Vec<u32> = snap.iter().map(|m| m.pid).collect();
            assert_eq!(all, expected, "boundary {}", boundary);
            assert!(bundles.iter().all(|b| !b.is_empty()));
        }
    }

    #[test]
    fn test_cyclic_parent_links_terminate() {
        // 10 -> 11 -> 12 -> 10: impossible on a live system, must not hang
        let snap = snapshot(vec![
            FixtureProcess::new(10, 12, 10, &["a"]),
            FixtureProcess::new(11, 10, 11, &["b"]),
            FixtureProcess::new(12, 11, 12, &["c"]),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZero);
        let total: usize = bundles.iter().map(|b| b.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_vanished_process_is_kept() {
        let snap = snapshot(vec![
            FixtureProcess::new(1, 0, 1, &["/sbin/init"]),
            FixtureProcess::new(50, 1, 50, &["worker"]).gone(),
        ]);
        let bundles = build(&snap, KernelBoundary::PgidZero);
        assert!(bundles.iter().any(|b| b.contains(50)));
    }
}
