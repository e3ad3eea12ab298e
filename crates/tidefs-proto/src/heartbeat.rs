use serde::{Deserialize, Serialize};
use tidefs_types::{NodeId, PartitionId};

/// One replica member of a data partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Peer {
    pub node_id: NodeId,
    pub addr: String,
}

/// Parameters for creating a data partition on a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateDataPartitionRequest {
    pub partition_id: PartitionId,
    pub partition_size: u64,
    pub volume_id: String,
    pub partition_type: String,
    pub members: Vec<Peer>,
    pub random_write: bool,
}

/// Per-partition slice of a heartbeat response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionReport {
    pub partition_id: u64,
    pub partition_status: u8,
    pub total: u64,
    pub used: u64,
    pub disk_path: String,
    pub is_leader: bool,
    pub extent_count: u64,
}

/// Capacity and partition snapshot a data node posts back on heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataNodeHeartbeatResponse {
    pub status: u8,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub created_partition_cnt: u32,
    pub created_partition_weights: u64,
    pub remain_weights_for_create_partition: u64,
    pub max_weights_for_create_partition: u64,
    pub rack_name: String,
    pub partition_reports: Vec<PartitionReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_roundtrip() {
        let req = CreateDataPartitionRequest {
            partition_id: PartitionId(7),
            partition_size: 128 << 20,
            volume_id: "vol-1".into(),
            partition_type: "extent".into(),
            members: vec![Peer {
                node_id: NodeId(2),
                addr: "10.0.0.2:17030".into(),
            }],
            random_write: true,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: CreateDataPartitionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_heartbeat_response_defaults() {
        let rsp = DataNodeHeartbeatResponse::default();
        assert_eq!(rsp.total, 0);
        assert!(rsp.partition_reports.is_empty());
        assert!(rsp.rack_name.is_empty());
    }

    #[test]
    fn test_partition_report_roundtrip() {
        let report = PartitionReport {
            partition_id: 3,
            partition_status: 1,
            total: 100,
            used: 40,
            disk_path: "/data/disk0".into(),
            is_leader: true,
            extent_count: 12,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: PartitionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
