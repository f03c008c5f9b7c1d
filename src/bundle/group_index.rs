//! Partition of a snapshot by process group.

use crate::process::Snapshot;
use ahash::AHashMap as HashMap;

/// One process group with its members in snapshot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup {
    pub pgid: u32,
    pub members: Vec<u32>,
}

impl ProcessGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups ordered largest first, so bigger families claim shared ancestors
/// and subtrees before the leftovers do. Equal sizes are ordered by pgid.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: Vec<ProcessGroup>,
}

impl GroupIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut by_pgid: HashMap<u32, Vec<u32>> = HashMap::new();
        for m in snapshot.iter() {
            by_pgid.entry(m.pgid).or_default().push(m.pid);
        }

        let mut groups: Vec<ProcessGroup> = by_pgid
            .into_iter()
            .map(|(pgid, members)| ProcessGroup { pgid, members })
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then(a.pgid.cmp(&b.pgid)));

        Self { groups }
    }

    pub fn groups(&self) -> &[ProcessGroup] {
        &self.groups
    }

    pub fn get(&self, pgid: u32) -> Option<&ProcessGroup> {
        self.groups.iter().find(|g| g.pgid == pgid)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Same index with one group left out.
    #[cfg(test)]
    pub(crate) fn without(mut self, pgid: u32) -> Self {
        self.groups.retain(|g| g.pgid != pgid);
        self
    }
}
