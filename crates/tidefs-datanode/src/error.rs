use std::path::PathBuf;

use thiserror::Error;
use tidefs_types::PartitionId;

/// Errors surfaced by the space manager and its collaborators.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("disk {0} not found")]
    UnknownDisk(PathBuf),

    /// The placement cursor walked every disk and none had enough free
    /// space for the requested partition size.
    #[error("no disk has enough space to create the partition")]
    NoDiskForCreatePartition,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("partition {id}: {message}")]
    Partition { id: PartitionId, message: String },

    #[error("raft submit failed: {0}")]
    Raft(String),
}

pub type Result<T> = std::result::Result<T, SpaceError>;
