pub mod config;
pub mod disk;
pub mod error;
pub mod heartbeat;
pub mod partition;
pub mod post;
pub mod raft;
pub mod space_manager;
pub mod stats;
pub mod store;

pub use config::SpaceManagerConfig;
pub use disk::Disk;
pub use error::{Result, SpaceError};
pub use partition::{
    parse_partition_dir_name, partition_dir_name, DataPartition, PartitionConfig,
    PartitionFactory, PartitionStatus,
};
pub use post::{PostProcessor, ReplPacket};
pub use raft::RaftStore;
pub use space_manager::SpaceManager;
pub use stats::{Stats, StatsSnapshot};
pub use store::{is_tiny_extent, ExtentStore, TinyExtentQueues, TINY_EXTENT_COUNT};
