use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use tidefs_types::unix_seconds;

use crate::opcode::Opcode;

/// Lifecycle state of an admin task.
///
/// The sender drives `Pending -> Running` and evicts on timeout; the
/// terminal transitions are driven by the out-of-band reply handler.
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
pub enum TaskStatus {
    Pending = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
    TimedOut = 4,
}

/// One unit of control-plane work, pushed from the master to a node.
///
/// Identity fields are immutable; the dispatch bookkeeping
/// (`status`, `send_count`, `send_time`) is atomic so registry
/// snapshots can hand out shared references and mutate them outside
/// the registry lock. Timestamps are unix seconds; `send_time == 0`
/// means the task has never been written to a connection.
#[derive(Debug)]
pub struct AdminTask {
    id: String,
    opcode: Opcode,
    body: Bytes,
    status: AtomicU8,
    send_count: AtomicU32,
    send_time: AtomicI64,
    created_time: i64,
}

impl AdminTask {
    pub fn new(id: impl Into<String>, opcode: Opcode, body: Bytes) -> Self {
        Self {
            id: id.into(),
            opcode,
            body,
            status: AtomicU8::new(TaskStatus::Pending.into()),
            send_count: AtomicU32::new(0),
            send_time: AtomicI64::new(0),
            created_time: unix_seconds(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn created_time(&self) -> i64 {
        self.created_time
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::try_from(self.status.load(Ordering::Acquire))
            .unwrap_or(TaskStatus::Pending)
    }

    pub fn set_status(&self, status: TaskStatus) {
        self.status.store(status.into(), Ordering::Release);
    }

    pub fn send_count(&self) -> u32 {
        self.send_count.load(Ordering::Acquire)
    }

    pub fn incr_send_count(&self) {
        self.send_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn send_time(&self) -> i64 {
        self.send_time.load(Ordering::Acquire)
    }

    pub fn set_send_time(&self, secs: i64) {
        self.send_time.store(secs, Ordering::Release);
    }

    /// Whether the task is due for (re-)dispatch.
    ///
    /// Pending tasks are always due; running tasks become due again once
    /// `resend_interval` seconds have elapsed since the last write.
    pub fn needs_send(&self, now: i64, resend_interval: i64) -> bool {
        match self.status() {
            TaskStatus::Pending => true,
            TaskStatus::Running => now - self.send_time() >= resend_interval,
            _ => false,
        }
    }

    /// Whether the task should be evicted from the registry.
    ///
    /// Either the send budget is exhausted or the task has been silent
    /// for `task_timeout` seconds since its last write. Tasks that were
    /// never written (`send_time == 0`) only time out via the budget.
    pub fn timed_out(&self, now: i64, max_sends: u32, task_timeout: i64) -> bool {
        if self.send_count() >= max_sends {
            return true;
        }
        let sent = self.send_time();
        sent > 0 && now - sent >= task_timeout
    }

    /// Snapshot the task into its wire representation.
    pub fn to_frame(&self) -> AdminTaskFrame {
        AdminTaskFrame {
            id: self.id.clone(),
            opcode: self.opcode,
            body: self.body.to_vec(),
            status: self.status(),
            send_count: self.send_count(),
            send_time: self.send_time(),
            created_time: self.created_time,
        }
    }

    /// Rebuild a task from its wire representation.
    pub fn from_frame(frame: AdminTaskFrame) -> Self {
        Self {
            id: frame.id,
            opcode: frame.opcode,
            body: Bytes::from(frame.body),
            status: AtomicU8::new(frame.status.into()),
            send_count: AtomicU32::new(frame.send_count),
            send_time: AtomicI64::new(frame.send_time),
            created_time: frame.created_time,
        }
    }
}

/// Wire form of an [`AdminTask`]; the whole task travels as the packet
/// body so the remote handler can echo it back with the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTaskFrame {
    pub id: String,
    pub opcode: Opcode,
    pub body: Vec<u8>,
    pub status: TaskStatus,
    pub send_count: u32,
    pub send_time: i64,
    pub created_time: i64,
}

/// Conventional task id: `<target>_<opcode>_<key>`.
pub fn task_id(target: &str, opcode: Opcode, key: impl std::fmt::Display) -> String {
    format!("{}_{:?}_{}", target, opcode, key)
}
