use tidefs_types::PartitionId;

use crate::error::Result;

/// Submit seam into the replicated metadata log.
///
/// Consensus, snapshots, and membership live outside this crate; the
/// space manager only hands the store to partitions it builds.
pub trait RaftStore: Send + Sync {
    fn submit(&self, partition_id: PartitionId, cmd: Vec<u8>) -> Result<()>;
}
