use crossbeam::queue::ArrayQueue;
use tidefs_types::ExtentId;

/// Number of pooled tiny extents per partition store; their ids occupy
/// `1..=TINY_EXTENT_COUNT`.
pub const TINY_EXTENT_COUNT: u64 = 64;

/// Whether the id addresses a pooled tiny extent.
pub fn is_tiny_extent(id: ExtentId) -> bool {
    (1..=TINY_EXTENT_COUNT).contains(&id.raw())
}

/// The slice of the extent-store engine this crate consumes.
///
/// The engine itself (extent files, checksums, compaction) lives
/// elsewhere; the space manager only needs the tiny-extent free queues
/// and the extent count reported in heartbeats.
pub trait ExtentStore: Send + Sync {
    /// Return a healthy tiny extent to the allocatable queue.
    fn put_tiny_extent_available(&self, id: ExtentId);

    /// Park a tiny extent that saw an error until it is repaired.
    fn put_tiny_extent_unavailable(&self, id: ExtentId);

    /// Number of extents the store currently holds.
    fn extent_count(&self) -> u64;
}

/// Free queues backing tiny-extent pooling in a store implementation.
pub struct TinyExtentQueues {
    available: ArrayQueue<ExtentId>,
    unavailable: ArrayQueue<ExtentId>,
}

impl TinyExtentQueues {
    pub fn new() -> Self {
        Self {
            available: ArrayQueue::new(TINY_EXTENT_COUNT as usize),
            unavailable: ArrayQueue::new(TINY_EXTENT_COUNT as usize),
        }
    }

    pub fn put_available(&self, id: ExtentId) {
        let _ = self.available.push(id);
    }

    pub fn put_unavailable(&self, id: ExtentId) {
        let _ = self.unavailable.push(id);
    }

    pub fn take_available(&self) -> Option<ExtentId> {
        self.available.pop()
    }

    pub fn take_unavailable(&self) -> Option<ExtentId> {
        self.unavailable.pop()
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn unavailable_len(&self) -> usize {
        self.unavailable.len()
    }
}

impl Default for TinyExtentQueues {
    fn default() -> Self {
        Self::new()
    }
}
