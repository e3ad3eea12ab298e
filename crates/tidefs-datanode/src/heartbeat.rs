use tidefs_proto::{DataNodeHeartbeatResponse, PartitionReport, TaskStatus};
use tracing::debug;

use crate::space_manager::SpaceManager;

impl SpaceManager {
    /// Assemble the heartbeat response: aggregate stats copied under
    /// the stats lock, then one report per partition.
    ///
    /// The partition sweep runs over a snapshot, so creates and deletes
    /// racing the heartbeat may or may not appear in the report.
    pub fn fill_heartbeat(&self, response: &mut DataNodeHeartbeatResponse) {
        response.status = TaskStatus::Succeeded.into();

        let stats = self.stats().snapshot();
        response.total = stats.total;
        response.used = stats.used;
        response.available = stats.available;
        response.created_partition_cnt = stats.created_partition_cnt as u32;
        response.created_partition_weights = stats.created_partition_weights;
        response.remain_weights_for_create_partition = stats.remain_weights_for_create_partition;
        response.max_weights_for_create_partition = stats.max_weights_for_create_partition;
        response.rack_name = self.rack_name().to_string();

        response.partition_reports = Vec::new();
        self.range_partitions(|partition| {
            let (leader_addr, is_leader) = partition.is_leader();
            let report = PartitionReport {
                partition_id: partition.id().raw() as u64,
                partition_status: partition.status().into(),
                total: partition.size(),
                used: partition.used(),
                disk_path: partition.disk().path().display().to_string(),
                is_leader,
                extent_count: partition.store().extent_count(),
            };
            debug!(
                partition = %partition.id(),
                status = ?partition.status(),
                leader = ?leader_addr,
                is_leader,
                "heartbeat partition report"
            );
            response.partition_reports.push(report);
            true
        });
    }
}
