use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tidefs_types::PartitionId;
use tracing::{debug, warn};

use crate::error::Result;
use crate::partition::{parse_partition_dir_name, DataPartition, PartitionFactory};

/// Called for each partition recovered while restoring a disk.
pub type PartitionVisitor<'a> = dyn FnMut(Arc<dyn DataPartition>) + 'a;

/// One local disk registered with the space manager.
///
/// Capacity fields are atomics refreshed from the filesystem
/// (`rest_size` reserved bytes subtracted) plus the allocation ledger of
/// attached partitions. A disk is created once per path and lives as
/// long as the process; partitions attach and detach over time.
#[derive(Debug)]
pub struct Disk {
    path: PathBuf,
    rest_size: u64,
    max_errs: u32,
    total: AtomicU64,
    used: AtomicU64,
    available: AtomicU64,
    allocated: AtomicU64,
    unallocated: AtomicU64,
    partitions: RwLock<HashMap<PartitionId, u64>>,
}

impl Disk {
    /// Register the disk at `path`, sampling its filesystem usage.
    pub fn load(path: impl Into<PathBuf>, rest_size: u64, max_errs: u32) -> Result<Arc<Self>> {
        let disk = Arc::new(Self {
            path: path.into(),
            rest_size,
            max_errs,
            total: AtomicU64::new(0),
            used: AtomicU64::new(0),
            available: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            unallocated: AtomicU64::new(0),
            partitions: RwLock::new(HashMap::new()),
        });
        disk.refresh_usage()?;
        Ok(disk)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rest_size(&self) -> u64 {
        self.rest_size
    }

    pub fn max_errs(&self) -> u32 {
        self.max_errs
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn available(&self) -> u64 {
        self.available.load(Ordering::Acquire)
    }

    /// Bytes provisioned to attached partitions.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    /// Bytes still open for new partitions.
    pub fn unallocated(&self) -> u64 {
        self.unallocated.load(Ordering::Acquire)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    /// Record a partition placed on this disk.
    pub fn attach_partition(&self, id: PartitionId, size: u64) {
        self.partitions.write().insert(id, size);
        self.recompute_allocation();
    }

    /// Drop a partition from this disk's ledger; unknown ids are a
    /// no-op.
    pub fn detach_partition(&self, id: PartitionId) {
        self.partitions.write().remove(&id);
        self.recompute_allocation();
    }

    fn recompute_allocation(&self) {
        let allocated: u64 = self.partitions.read().values().sum();
        self.allocated.store(allocated, Ordering::Release);
        self.unallocated
            .store(self.total().saturating_sub(allocated), Ordering::Release);
    }

    /// Re-sample filesystem usage, keeping `rest_size` in reserve.
    pub fn refresh_usage(&self) -> Result<()> {
        let (fs_total, fs_available) = fs_usage(&self.path)?;
        let total = fs_total.saturating_sub(self.rest_size);
        let available = fs_available.saturating_sub(self.rest_size);
        self.total.store(total, Ordering::Release);
        self.available.store(available, Ordering::Release);
        self.used
            .store(total.saturating_sub(available), Ordering::Release);
        self.recompute_allocation();
        Ok(())
    }

    /// Scan the disk for partition directories and rebuild their
    /// handles through `factory`, attaching each and passing it to
    /// `visitor`. Entries that fail to load are logged and skipped so
    /// one bad directory does not block the rest of the disk.
    pub fn restore_partitions(
        self: &Arc<Self>,
        factory: &dyn PartitionFactory,
        visitor: &mut PartitionVisitor<'_>,
    ) -> Result<()> {
        for entry in std::fs::read_dir(&self.path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(disk = %self.path.display(), %err, "unreadable disk entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-utf8 entry");
                continue;
            };
            let Some((id, size)) = parse_partition_dir_name(name) else {
                continue;
            };
            match factory.load(Arc::clone(self), id, size, entry.path()) {
                Ok(partition) => {
                    debug!(disk = %self.path.display(), partition = %id, "restored partition");
                    self.attach_partition(id, size);
                    visitor(partition);
                }
                Err(err) => {
                    warn!(
                        disk = %self.path.display(),
                        partition = %id,
                        %err,
                        "failed to restore partition"
                    );
                }
            }
        }
        Ok(())
    }

    /// Pin capacity fields to known values, bypassing the filesystem.
    #[cfg(test)]
    pub(crate) fn set_space(&self, total: u64, available: u64) {
        self.total.store(total, Ordering::Release);
        self.available.store(available, Ordering::Release);
        self.used
            .store(total.saturating_sub(available), Ordering::Release);
        self.recompute_allocation();
    }
}

#[cfg(unix)]
fn fs_usage(path: &Path) -> std::io::Result<(u64, u64)> {
    use std::os::unix::ffi::OsStrExt;

    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(cpath.as_ptr(), &mut stat) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let frsize = stat.f_frsize as u64;
    Ok((
        stat.f_blocks as u64 * frsize,
        stat.f_bavail as u64 * frsize,
    ))
}

#[cfg(not(unix))]
fn fs_usage(_path: &Path) -> std::io::Result<(u64, u64)> {
    Ok((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpaceError;
    use crate::partition::{partition_dir_name, PartitionConfig, PartitionStatus};
    use crate::store::ExtentStore;
    use tidefs_types::ExtentId;

    struct NullStore;

    impl ExtentStore for NullStore {
        fn put_tiny_extent_available(&self, _id: ExtentId) {}
        fn put_tiny_extent_unavailable(&self, _id: ExtentId) {}
        fn extent_count(&self) -> u64 {
            0
        }
    }

    struct StubPartition {
        id: PartitionId,
        size: u64,
        disk: Arc<Disk>,
        path: PathBuf,
    }

    impl DataPartition for StubPartition {
        fn id(&self) -> PartitionId {
            self.id
        }
        fn size(&self) -> u64 {
            self.size
        }
        fn used(&self) -> u64 {
            0
        }
        fn status(&self) -> PartitionStatus {
            PartitionStatus::ReadWrite
        }
        fn path(&self) -> PathBuf {
            self.path.clone()
        }
        fn disk(&self) -> Arc<Disk> {
            Arc::clone(&self.disk)
        }
        fn is_leader(&self) -> (Option<String>, bool) {
            (None, false)
        }
        fn store(&self) -> Arc<dyn ExtentStore> {
            Arc::new(NullStore)
        }
        fn stop(&self) {}
        fn flush_delete(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StubFactory {
        fail_loads: bool,
    }

    impl PartitionFactory for StubFactory {
        fn create(
            &self,
            config: &PartitionConfig,
            disk: Arc<Disk>,
        ) -> Result<Arc<dyn DataPartition>> {
            let path = disk.path().join(partition_dir_name(config.id, config.partition_size));
            Ok(Arc::new(StubPartition {
                id: config.id,
                size: config.partition_size,
                disk,
                path,
            }))
        }

        fn load(
            &self,
            disk: Arc<Disk>,
            id: PartitionId,
            size: u64,
            path: PathBuf,
        ) -> Result<Arc<dyn DataPartition>> {
            if self.fail_loads {
                return Err(SpaceError::Partition {
                    id,
                    message: "corrupt metadata".into(),
                });
            }
            Ok(Arc::new(StubPartition {
                id,
                size,
                disk,
                path,
            }))
        }
    }

    #[test]
    fn test_load_samples_usage() {
        let dir = tempfile::tempdir().unwrap();
        let disk = Disk::load(dir.path(), 0, 5).unwrap();
        assert!(disk.total() > 0);
        assert!(disk.available() <= disk.total());
        assert_eq!(disk.partition_count(), 0);
    }

    #[test]
    fn test_rest_size_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let unreserved = Disk::load(dir.path(), 0, 5).unwrap();
        let reserved = Disk::load(dir.path(), 1 << 20, 5).unwrap();
        assert!(reserved.total() < unreserved.total());
        assert!(reserved.available() < unreserved.available());
    }

    #[test]
    fn test_attach_detach_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let disk = Disk::load(dir.path(), 0, 5).unwrap();
        disk.set_space(1000, 800);

        disk.attach_partition(PartitionId(1), 100);
        disk.attach_partition(PartitionId(2), 300);
        assert_eq!(disk.partition_count(), 2);
        assert_eq!(disk.allocated(), 400);
        assert_eq!(disk.unallocated(), 600);

        disk.detach_partition(PartitionId(1));
        assert_eq!(disk.allocated(), 300);
        assert_eq!(disk.unallocated(), 700);

        // Detaching an unknown id changes nothing.
        disk.detach_partition(PartitionId(99));
        assert_eq!(disk.partition_count(), 1);
    }

    #[test]
    fn test_restore_finds_partition_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(partition_dir_name(PartitionId(5), 100))).unwrap();
        std::fs::create_dir(dir.path().join(partition_dir_name(PartitionId(6), 200))).unwrap();
        std::fs::create_dir(dir.path().join("lost+found")).unwrap();

        let disk = Disk::load(dir.path(), 0, 5).unwrap();
        let mut seen = Vec::new();
        disk.restore_partitions(&StubFactory { fail_loads: false }, &mut |dp| {
            seen.push(dp.id());
        })
        .unwrap();

        seen.sort();
        assert_eq!(seen, vec![PartitionId(5), PartitionId(6)]);
        assert_eq!(disk.partition_count(), 2);
        assert_eq!(disk.allocated(), 300);
    }

    #[test]
    fn test_restore_skips_failed_loads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(partition_dir_name(PartitionId(5), 100))).unwrap();

        let disk = Disk::load(dir.path(), 0, 5).unwrap();
        let mut seen = 0;
        disk.restore_partitions(&StubFactory { fail_loads: true }, &mut |_| {
            seen += 1;
        })
        .unwrap();

        assert_eq!(seen, 0);
        assert_eq!(disk.partition_count(), 0);
    }
}
