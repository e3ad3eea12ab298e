use std::path::PathBuf;
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use tidefs_proto::Peer;
use tidefs_types::{NodeId, PartitionId};

use crate::disk::Disk;
use crate::error::Result;
use crate::store::ExtentStore;

/// Serving state of a data partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum PartitionStatus {
    Unavailable = 0,
    ReadOnly = 1,
    ReadWrite = 2,
}

/// Everything a factory needs to build one partition.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    pub id: PartitionId,
    pub volume_id: String,
    pub peers: Vec<Peer>,
    pub partition_size: u64,
    pub partition_type: String,
    pub random_write: bool,
    pub node_id: NodeId,
    pub cluster_id: String,
}

/// Handle to one data partition.
///
/// The storage engine behind the handle is external; the space manager
/// owns the handle's lifecycle (create, lookup, delete) and consults it
/// for placement accounting and heartbeat reports. Handles keep a
/// back-reference to their disk; the disk only tracks partition ids, so
/// ownership stays acyclic.
pub trait DataPartition: Send + Sync {
    fn id(&self) -> PartitionId;

    /// Provisioned size in bytes.
    fn size(&self) -> u64;

    /// Bytes currently used.
    fn used(&self) -> u64;

    fn status(&self) -> PartitionStatus;

    /// The partition's on-disk directory.
    fn path(&self) -> PathBuf;

    /// The disk this partition is placed on.
    fn disk(&self) -> Arc<Disk>;

    /// Replication leader address, and whether this node is the leader.
    fn is_leader(&self) -> (Option<String>, bool);

    fn store(&self) -> Arc<dyn ExtentStore>;

    /// Stop serving; called while the partition is already unreachable
    /// through the directory.
    fn stop(&self);

    /// Flush accumulated extent deletions to the engine.
    fn flush_delete(&self) -> Result<()>;
}

/// Builds partitions on behalf of the space manager.
///
/// `create` formats a brand-new partition under the disk's path;
/// `load` rebuilds a handle from a directory found during disk
/// restore. Neither attaches the partition to the disk; the caller
/// does that once the handle is registered.
pub trait PartitionFactory: Send + Sync {
    fn create(&self, config: &PartitionConfig, disk: Arc<Disk>) -> Result<Arc<dyn DataPartition>>;

    fn load(
        &self,
        disk: Arc<Disk>,
        id: PartitionId,
        size: u64,
        path: PathBuf,
    ) -> Result<Arc<dyn DataPartition>>;
}

/// Directory name a partition occupies under its disk.
pub fn partition_dir_name(id: PartitionId, size: u64) -> String {
    format!("partition_{}_{}", id, size)
}

/// Parse a directory name produced by [`partition_dir_name`].
pub fn parse_partition_dir_name(name: &str) -> Option<(PartitionId, u64)> {
    let rest = name.strip_prefix("partition_")?;
    let (id, size) = rest.split_once('_')?;
    Some((PartitionId(id.parse().ok()?), size.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_name_roundtrip() {
        let name = partition_dir_name(PartitionId(12), 1 << 30);
        assert_eq!(name, "partition_12_1073741824");
        assert_eq!(
            parse_partition_dir_name(&name),
            Some((PartitionId(12), 1 << 30))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(parse_partition_dir_name("lost+found"), None);
        assert_eq!(parse_partition_dir_name("partition_"), None);
        assert_eq!(parse_partition_dir_name("partition_abc_10"), None);
        assert_eq!(parse_partition_dir_name("partition_3_big"), None);
    }

    #[test]
    fn test_status_repr() {
        let raw: u8 = PartitionStatus::ReadWrite.into();
        assert_eq!(raw, 2);
        assert_eq!(
            PartitionStatus::try_from(1u8).unwrap(),
            PartitionStatus::ReadOnly
        );
        assert!(PartitionStatus::try_from(9u8).is_err());
    }
}
