use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tidefs_proto::CreateDataPartitionRequest;
use tidefs_types::{NodeId, PartitionId};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::SpaceManagerConfig;
use crate::disk::Disk;
use crate::error::{Result, SpaceError};
use crate::partition::{DataPartition, PartitionConfig, PartitionFactory};
use crate::raft::RaftStore;
use crate::stats::{Stats, StatsSnapshot};

/// Capacity metrics roll up on this cadence.
pub const METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Accumulated extent deletions flush on this cadence.
pub const FLUSH_DELETE_INTERVAL: Duration = Duration::from_secs(120);

/// Registered disks plus the insertion-ordered placement rotation.
#[derive(Default)]
struct DiskSet {
    by_path: HashMap<PathBuf, Arc<Disk>>,
    order: Vec<PathBuf>,
    cursor: usize,
}

/// Owns a data node's disks and the partitions placed on them.
///
/// Construction starts the two background schedulers (metrics roll-up
/// and delete flush); [`SpaceManager::stop`] terminates both and is
/// safe to call any number of times.
pub struct SpaceManager {
    config: SpaceManagerConfig,
    factory: Arc<dyn PartitionFactory>,
    disks: RwLock<DiskSet>,
    partitions: RwLock<HashMap<PartitionId, Arc<dyn DataPartition>>>,
    raft_store: RwLock<Option<Arc<dyn RaftStore>>>,
    stats: Stats,
    create_lock: Mutex<()>,
    stop_tx: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl SpaceManager {
    pub fn new(config: SpaceManagerConfig, factory: Arc<dyn PartitionFactory>) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        let space = Arc::new(Self {
            config,
            factory,
            disks: RwLock::new(DiskSet::default()),
            partitions: RwLock::new(HashMap::new()),
            raft_store: RwLock::new(None),
            stats: Stats::new(),
            create_lock: Mutex::new(()),
            stop_tx,
            stopped: AtomicBool::new(false),
        });
        space.start_schedulers();
        space
    }

    fn start_schedulers(self: &Arc<Self>) {
        let metrics = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(METRICS_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => metrics.update_metrics(),
                    _ = stop_rx.changed() => break,
                }
            }
        });

        let flusher = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FLUSH_DELETE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => flusher.flush_deletes(),
                    _ = stop_rx.changed() => break,
                }
            }
        });
    }

    /// Terminate the background schedulers; idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(true);
    }

    pub fn cluster_id(&self) -> &str {
        &self.config.cluster_id
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn rack_name(&self) -> &str {
        &self.config.rack_name
    }

    pub fn set_raft_store(&self, raft_store: Arc<dyn RaftStore>) {
        *self.raft_store.write() = Some(raft_store);
    }

    pub fn raft_store(&self) -> Option<Arc<dyn RaftStore>> {
        self.raft_store.read().clone()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Register the disk at `path`, restoring any partitions already on
    /// it. Re-loading a known path is a no-op.
    pub fn load_disk(&self, path: &Path, rest_size: u64, max_errs: u32) -> Result<()> {
        if self.get_disk(path).is_ok() {
            return Ok(());
        }
        debug!(path = %path.display(), "loading disk");
        let disk = Disk::load(path, rest_size, max_errs)?;
        disk.restore_partitions(self.factory.as_ref(), &mut |partition| {
            let mut partitions = self.partitions.write();
            if !partitions.contains_key(&partition.id()) {
                debug!(partition = %partition.id(), "registered restored partition");
                partitions.insert(partition.id(), partition);
            }
        })?;
        self.put_disk(disk);
        Ok(())
    }

    pub fn get_disk(&self, path: &Path) -> Result<Arc<Disk>> {
        self.disks
            .read()
            .by_path
            .get(path)
            .cloned()
            .ok_or_else(|| SpaceError::UnknownDisk(path.to_path_buf()))
    }

    pub fn disks(&self) -> Vec<Arc<Disk>> {
        self.disks.read().by_path.values().cloned().collect()
    }

    fn put_disk(&self, disk: Arc<Disk>) {
        let mut set = self.disks.write();
        let path = disk.path().to_path_buf();
        if set.by_path.insert(path.clone(), disk).is_none() {
            set.order.push(path);
        }
    }

    /// Advance the placement cursor one step and return that disk.
    ///
    /// Pure rotation: fitness is the caller's concern.
    fn next_placement_disk(&self) -> Option<Arc<Disk>> {
        let mut set = self.disks.write();
        if set.order.is_empty() {
            return None;
        }
        if set.cursor >= set.order.len() {
            set.cursor = 0;
        }
        let path = set.order[set.cursor].clone();
        set.cursor += 1;
        set.by_path.get(&path).cloned()
    }

    fn pick_disk_for(&self, required_size: u64) -> Result<Arc<Disk>> {
        let disk_count = self.disks.read().order.len();
        for _ in 0..disk_count {
            if let Some(disk) = self.next_placement_disk() {
                if disk.available() >= required_size {
                    return Ok(disk);
                }
            }
        }
        Err(SpaceError::NoDiskForCreatePartition)
    }

    /// Sum per-disk capacity fields into the stats snapshot.
    pub fn update_metrics(&self) {
        let snapshot = {
            let set = self.disks.read();
            let mut s = StatsSnapshot::default();
            for disk in set.by_path.values() {
                s.total += disk.total();
                s.used += disk.used();
                s.available += disk.available();
                s.created_partition_weights += disk.allocated();
                s.remain_weights_for_create_partition += disk.unallocated();
                s.created_partition_cnt += disk.partition_count() as u64;
                s.max_weights_for_create_partition =
                    s.max_weights_for_create_partition.max(disk.unallocated());
            }
            s
        };
        debug!(
            total = snapshot.total,
            used = snapshot.used,
            available = snapshot.available,
            partitions = snapshot.created_partition_cnt,
            "updated space metrics"
        );
        self.stats.update(snapshot);
    }

    pub fn get_partition(&self, id: PartitionId) -> Option<Arc<dyn DataPartition>> {
        self.partitions.read().get(&id).cloned()
    }

    /// Visit a snapshot of all partitions outside the lock, stopping
    /// when `f` returns false.
    pub fn range_partitions(&self, mut f: impl FnMut(&Arc<dyn DataPartition>) -> bool) {
        let snapshot: Vec<Arc<dyn DataPartition>> =
            self.partitions.read().values().cloned().collect();
        for partition in &snapshot {
            if !f(partition) {
                break;
            }
        }
    }

    /// Create a partition, choosing a disk by rotation among those that
    /// fit. Creating an id that already exists returns the existing
    /// handle.
    pub fn create_partition(
        &self,
        request: &CreateDataPartitionRequest,
    ) -> Result<Arc<dyn DataPartition>> {
        let _guard = self.create_lock.lock();
        if let Some(existing) = self.get_partition(request.partition_id) {
            return Ok(existing);
        }

        let disk = self.pick_disk_for(request.partition_size)?;
        let config = PartitionConfig {
            id: request.partition_id,
            volume_id: request.volume_id.clone(),
            peers: request.members.clone(),
            partition_size: request.partition_size,
            partition_type: request.partition_type.clone(),
            random_write: request.random_write,
            node_id: self.config.node_id,
            cluster_id: self.config.cluster_id.clone(),
        };
        let partition = self.factory.create(&config, Arc::clone(&disk))?;
        disk.attach_partition(partition.id(), request.partition_size);
        self.partitions
            .write()
            .insert(partition.id(), Arc::clone(&partition));
        Ok(partition)
    }

    /// Remove a partition: directory entry first so in-flight requests
    /// stop finding it, then stop, detach from its disk, and erase its
    /// on-disk tree. Unknown ids are a no-op.
    pub fn delete_partition(&self, id: PartitionId) {
        let Some(partition) = self.get_partition(id) else {
            return;
        };
        self.partitions.write().remove(&id);
        partition.stop();
        partition.disk().detach_partition(id);
        match std::fs::remove_dir_all(partition.path()) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(partition = %id, %err, "failed to remove partition directory");
            }
        }
    }

    /// Flush accumulated deletions on every partition; failures are
    /// logged and do not stop the sweep.
    pub fn flush_deletes(&self) {
        let mut partitions = Vec::new();
        self.range_partitions(|partition| {
            partitions.push(Arc::clone(partition));
            true
        });
        for partition in partitions {
            if let Err(err) = partition.flush_delete() {
                warn!(partition = %partition.id(), %err, "flush delete failed");
            }
        }
    }
}

impl Drop for SpaceManager {
    fn drop(&mut self) {
        self.stop();
    }
}
