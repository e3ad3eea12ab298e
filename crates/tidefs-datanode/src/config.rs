use serde::Deserialize;
use tidefs_types::NodeId;

/// Identity of the data node that owns the space manager.
///
/// Per-disk tuning (`rest_size`, `max_errs`) travels with each
/// `load_disk` call instead, since disks can differ.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaceManagerConfig {
    #[serde(default)]
    pub cluster_id: String,

    #[serde(default)]
    pub node_id: NodeId,

    #[serde(default)]
    pub rack_name: String,
}
