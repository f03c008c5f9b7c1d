//! Fixed-capacity ring buffer of per-bundle samples.
//!
//! Entries have a fixed size so the memory budget of the sample store is
//! predictable.

use crate::bundle::{BundleRecord, Metric, MetricValue};

/// Size of a single sample entry in bytes.
pub const ENTRY_SIZE_BYTES: usize = 80;

/// One bundle reading of one scan.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleEntry {
    pub timestamp: i64,    // 8 bytes - Unix timestamp
    pub rss: u64,          // 8 bytes
    pub vms: u64,          // 8 bytes
    pub ctx_vol: u64,      // 8 bytes
    pub ctx_invol: u64,    // 8 bytes
    pub pcpu: f64,         // 8 bytes
    pub n_fds: u64,        // 8 bytes
    pub n_open_files: u64, // 8 bytes
    pub n_sockets: u64,    // 8 bytes
    pub members: u64,      // 8 bytes
}

impl SampleEntry {
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

impl From<&BundleRecord> for SampleEntry {
    fn from(r: &BundleRecord) -> Self {
        Self {
            timestamp: r.timestamp,
            rss: r.rss,
            vms: r.vms,
            ctx_vol: r.ctx_vol,
            ctx_invol: r.ctx_invol,
            pcpu: r.pcpu,
            n_fds: r.n_fds,
            n_open_files: r.n_open_files,
            n_sockets: r.n_sockets,
            members: r.members,
        }
    }
}

/// A circular buffer of sample entries with fixed capacity.
pub struct Ringbuffer {
    entries: Vec<SampleEntry>,
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl Ringbuffer {
    /// Creates a ringbuffer holding at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: vec![SampleEntry::default(); capacity],
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    /// Pushes a new entry, overwriting the oldest one when full.
    pub fn push(&mut self, entry: SampleEntry) {
        self.entries[self.write_index] = entry;
        self.write_index = (self.write_index + 1) % self.capacity;

        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// Most recently pushed entry.
    pub fn latest(&self) -> Option<&SampleEntry> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        Some(&self.entries[idx])
    }

    /// All entries, oldest first.
    pub fn history(&self) -> Vec<SampleEntry> {
        if self.count == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(self.count);
        if self.count < self.capacity {
            result.extend_from_slice(&self.entries[0..self.count]);
        } else {
            // full: oldest entry sits at write_index
            result.extend_from_slice(&self.entries[self.write_index..]);
            result.extend_from_slice(&self.entries[0..self.write_index]);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
