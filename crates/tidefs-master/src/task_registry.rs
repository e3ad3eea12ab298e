use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tidefs_proto::AdminTask;
use tracing::debug;

use crate::config::SenderConfig;

/// Outstanding admin tasks for one target, keyed by task id.
///
/// The lock is held only long enough to copy task references; all task
/// mutation happens through the tasks' atomic fields outside the lock.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<AdminTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the task unless its id is already present.
    pub fn put(&self, task: Arc<AdminTask>) {
        let mut tasks = self.tasks.write();
        tasks.entry(task.id().to_string()).or_insert(task);
    }

    /// Remove the task; removing an unknown id is a no-op.
    pub fn delete(&self, id: &str) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.remove(id) {
            if !task.opcode().is_heartbeat() {
                debug!(task = id, opcode = ?task.opcode(), "deleted admin task");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<AdminTask>> {
        self.tasks.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Tasks due for eviction at `now`, per the timeout predicate.
    pub fn list_timed_out(&self, now: i64, config: &SenderConfig) -> Vec<Arc<AdminTask>> {
        let tasks = self.tasks.read();
        tasks
            .values()
            .filter(|t| t.timed_out(now, config.max_sends, config.task_timeout_secs))
            .cloned()
            .collect()
    }

    /// Prioritized send batch for this tick.
    ///
    /// Heartbeat tasks come first, then urgent tasks; both are stamped
    /// (`send_time = now`, `send_count += 1`) at snapshot time so a
    /// re-entrant tick does not pick them again before the resend
    /// interval elapses. Normal tasks follow until the batch exceeds
    /// `max_batch`.
    pub fn list_to_send(&self, now: i64, config: &SenderConfig) -> Vec<Arc<AdminTask>> {
        let tasks = self.tasks.read();
        let mut batch = Vec::new();

        for task in tasks.values() {
            if task.opcode().is_heartbeat() && task.needs_send(now, config.resend_interval_secs) {
                task.set_send_time(now);
                task.incr_send_count();
                batch.push(Arc::clone(task));
            }
        }
        for task in tasks.values() {
            if task.opcode().is_urgent() && task.needs_send(now, config.resend_interval_secs) {
                task.set_send_time(now);
                task.incr_send_count();
                batch.push(Arc::clone(task));
            }
        }
        for task in tasks.values() {
            if !task.opcode().is_heartbeat()
                && !task.opcode().is_urgent()
                && task.needs_send(now, config.resend_interval_secs)
            {
                batch.push(Arc::clone(task));
            }
            if batch.len() > config.max_batch {
                break;
            }
        }
        batch
    }
}
