use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tidefs_net::{Conn, ConnPool};
use tidefs_proto::{ExtentMode, Opcode, ResultCode};
use tidefs_types::ExtentId;

use crate::partition::DataPartition;
use crate::store::is_tiny_extent;

/// The post-processing view of one completed request.
///
/// The reply pipeline shares the packet across tasks, so the mutable
/// flags are atomics. The partition back-reference is weak: the
/// directory is the sole owner of partition lifetime, and a packet
/// finishing after its partition is deleted simply skips release.
pub struct ReplPacket<C: Conn> {
    pub opcode: Opcode,
    pub extent_mode: ExtentMode,
    pub extent_id: ExtentId,
    pub result_code: u8,
    /// Whether this node was the replication leader for the request.
    pub is_leader: bool,
    /// Whether the request was relayed to follower replicas.
    pub is_forward: bool,
    need_reply: AtomicBool,
    released: AtomicBool,
    pub partition: Weak<dyn DataPartition>,
    forward_conns: Mutex<Vec<C>>,
}

impl<C: Conn> ReplPacket<C> {
    pub fn new(
        opcode: Opcode,
        extent_mode: ExtentMode,
        extent_id: ExtentId,
        partition: Weak<dyn DataPartition>,
    ) -> Self {
        Self {
            opcode,
            extent_mode,
            extent_id,
            result_code: ResultCode::OK,
            is_leader: false,
            is_forward: false,
            need_reply: AtomicBool::new(true),
            released: AtomicBool::new(false),
            partition,
            forward_conns: Mutex::new(Vec::new()),
        }
    }

    pub fn need_reply(&self) -> bool {
        self.need_reply.load(Ordering::Acquire)
    }

    pub fn set_need_reply(&self, need: bool) {
        self.need_reply.store(need, Ordering::Release);
    }

    /// Whether the request finished with an error result.
    pub fn is_err_packet(&self) -> bool {
        self.result_code != ResultCode::OK
    }

    /// Park a connection borrowed to relay this request; the post hook
    /// returns it to the pool once the request completes.
    pub fn add_forward_conn(&self, conn: C) {
        self.forward_conns.lock().push(conn);
    }

    pub fn take_forward_conns(&self) -> Vec<C> {
        std::mem::take(&mut *self.forward_conns.lock())
    }
}

/// Reply post-processing on the data node.
///
/// Decides whether a reply goes out at all, returns pooled tiny extents
/// to the store's free queues exactly once per packet, and hands
/// borrowed outbound connections back to the pool.
pub struct PostProcessor<C: Conn> {
    pool: Arc<ConnPool<C>>,
}

impl<C: Conn> PostProcessor<C> {
    pub fn new(pool: Arc<ConnPool<C>>) -> Self {
        Self { pool }
    }

    /// Run after a request handler completes, before any reply is sent.
    pub async fn post(&self, pkg: &ReplPacket<C>) {
        if pkg.opcode.is_master_command() {
            // Master commands answer out-of-band, through a fresh
            // connection back to the master.
            pkg.set_need_reply(false);
        }
        if pkg.opcode == Opcode::StreamRead {
            // The response was already streamed inline.
            pkg.set_need_reply(false);
        }
        if pkg.opcode == Opcode::CreateDataPartition {
            // The synchronous create path blocks on this reply.
            pkg.set_need_reply(true);
        }
        self.cleanup(pkg).await;
        if !pkg.opcode.is_master_command() {
            tidefs_monitor::counter("packets_completed").increment();
        }
    }

    async fn cleanup(&self, pkg: &ReplPacket<C>) {
        if pkg.opcode.is_master_command() {
            return;
        }
        if !pkg.is_leader {
            return;
        }
        self.release_extent(pkg);
        if pkg.extent_mode == ExtentMode::Tiny && pkg.opcode.is_write() {
            for conn in pkg.take_forward_conns() {
                self.pool.put(conn, false).await;
            }
        }
    }

    /// Return the packet's tiny extent to the store's free queues:
    /// the unavailable queue after an error, the available queue
    /// otherwise. The release flag is claimed with a compare-and-set
    /// before the enqueue, so concurrent calls release at most once.
    pub(crate) fn release_extent(&self, pkg: &ReplPacket<C>) {
        if pkg.extent_id.raw() == 0 || !is_tiny_extent(pkg.extent_id) {
            return;
        }
        if pkg.extent_mode != ExtentMode::Tiny
            || !pkg.is_leader
            || !pkg.opcode.is_write()
            || !pkg.is_forward
        {
            return;
        }
        let Some(partition) = pkg.partition.upgrade() else {
            return;
        };
        if pkg
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let store = partition.store();
        if pkg.is_err_packet() {
            store.put_tiny_extent_unavailable(pkg.extent_id);
        } else {
            store.put_tiny_extent_available(pkg.extent_id);
        }
    }
}
