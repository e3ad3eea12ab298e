use std::time::Duration;

use serde::Deserialize;

/// Tunables for one admin task sender.
///
/// Timestamp-based fields (`resend_interval_secs`, `task_timeout_secs`)
/// are in whole seconds because task send times are recorded at that
/// resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Largest batch assembled per tick; heartbeat and urgent tasks are
    /// always included, normal tasks stop once the batch exceeds this.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Dispatch tick period.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// Sleep applied when a tick finds nothing to send.
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep: Duration,

    /// Seconds after a write before a running task is re-sent.
    #[serde(default = "default_resend_interval_secs")]
    pub resend_interval_secs: i64,

    /// Seconds of silence after a write before a task is evicted.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: i64,

    /// Send attempts before a task is evicted regardless of silence.
    #[serde(default = "default_max_sends")]
    pub max_sends: u32,

    /// Per-packet write budget on the fire-and-forget path.
    #[serde(default = "default_write_deadline")]
    pub write_deadline: Duration,

    /// Reply budget on the synchronous create-partition path; partition
    /// creation formats on-disk state and is allowed to take a while.
    #[serde(default = "default_create_partition_deadline")]
    pub create_partition_deadline: Duration,
}

fn default_max_batch() -> usize {
    30
}

fn default_tick_interval() -> Duration {
    Duration::from_micros(200)
}

fn default_idle_sleep() -> Duration {
    Duration::from_secs(1)
}

fn default_resend_interval_secs() -> i64 {
    2
}

fn default_task_timeout_secs() -> i64 {
    100
}

fn default_max_sends() -> u32 {
    5
}

fn default_write_deadline() -> Duration {
    Duration::from_secs(1)
}

fn default_create_partition_deadline() -> Duration {
    Duration::from_secs(120)
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
            tick_interval: default_tick_interval(),
            idle_sleep: default_idle_sleep(),
            resend_interval_secs: default_resend_interval_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            max_sends: default_max_sends(),
            write_deadline: default_write_deadline(),
            create_partition_deadline: default_create_partition_deadline(),
        }
    }
}
