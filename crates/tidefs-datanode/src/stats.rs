use parking_lot::Mutex;

/// Aggregate capacity view across all disks, refreshed by the metrics
/// scheduler and read by the heartbeat builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    /// Bytes already provisioned to partitions.
    pub created_partition_weights: u64,
    /// Bytes still open for placement, summed over disks.
    pub remain_weights_for_create_partition: u64,
    /// Largest single-disk unallocated figure; the master's placement
    /// hint for whether any one disk can host a new partition.
    pub max_weights_for_create_partition: u64,
    pub created_partition_cnt: u64,
}

/// Snapshot cell with its own lock.
///
/// Neither side holds any other lock while touching this one: the
/// metrics task finishes its disk walk first, and the heartbeat builder
/// copies the snapshot out before ranging partitions.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, snapshot: StatsSnapshot) {
        *self.inner.lock() = snapshot;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock()
    }
}
