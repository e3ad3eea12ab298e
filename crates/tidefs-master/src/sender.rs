use std::sync::Arc;

use bytes::Bytes;
use tidefs_net::{frame, Conn, ConnPool};
use tidefs_proto::{AdminTask, Packet, TaskStatus};
use tidefs_types::unix_seconds;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SenderConfig;
use crate::error::TaskError;
use crate::task_registry::TaskRegistry;

/// Module tag used in alarm keys.
const MODULE_NAME: &str = "master";

/// Pushes admin commands to one remote node.
///
/// Callers enqueue tasks into the registry; a background loop drains it
/// every tick, evicting silent tasks and writing one request packet per
/// ready task over a pooled connection. Replies are not read here: the
/// remote posts them back to the master over its own connection, and
/// that handler drives the terminal task transitions. The one exception
/// is [`AdminTaskSender::sync_create_partition`], which waits for its
/// reply inline on a caller-provided connection.
pub struct AdminTaskSender<C: Conn> {
    cluster_id: String,
    target_addr: String,
    registry: TaskRegistry,
    pool: Arc<ConnPool<C>>,
    config: SenderConfig,
    stop_tx: watch::Sender<bool>,
}

impl<C: Conn> AdminTaskSender<C> {
    /// Build a sender without starting its dispatch loop.
    pub fn new(
        cluster_id: impl Into<String>,
        target_addr: impl Into<String>,
        pool: Arc<ConnPool<C>>,
        config: SenderConfig,
    ) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            cluster_id: cluster_id.into(),
            target_addr: target_addr.into(),
            registry: TaskRegistry::new(),
            pool,
            config,
            stop_tx,
        })
    }

    /// Build a sender and start its dispatch loop.
    pub fn spawn(
        cluster_id: impl Into<String>,
        target_addr: impl Into<String>,
        pool: Arc<ConnPool<C>>,
        config: SenderConfig,
    ) -> Arc<Self> {
        let sender = Self::new(cluster_id, target_addr, pool, config);
        sender.start();
        sender
    }

    /// Start the dispatch loop for this sender.
    pub fn start(self: &Arc<Self>) {
        let stop_rx = self.stop_tx.subscribe();
        tokio::spawn(Arc::clone(self).run(stop_rx));
    }

    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn put_task(&self, task: Arc<AdminTask>) {
        self.registry.put(task);
    }

    pub fn del_task(&self, id: &str) {
        self.registry.delete(id);
    }

    /// Terminate the dispatch loop; safe to call more than once.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            if *stop_rx.borrow() {
                break;
            }
            self.evict_timed_out();
            self.dispatch_ready(&mut stop_rx).await;
        }
        warn!(
            cluster = %self.cluster_id,
            addr = %self.target_addr,
            "admin task sender stopped"
        );
    }

    /// Drop every task that timed out, warning the operator about tasks
    /// that were actually written at least once. Timed-out tasks are
    /// not retried; the warning is the only remediation.
    fn evict_timed_out(&self) {
        let now = unix_seconds();
        for task in self.registry.list_timed_out(now, &self.config) {
            warn!(
                cluster = %self.cluster_id,
                task = task.id(),
                send_count = task.send_count(),
                "task had no response until timeout"
            );
            if task.send_time() > 0 {
                tidefs_monitor::alarm(
                    &format!("{}_{}_taskTimeout", self.cluster_id, MODULE_NAME),
                    &format!(
                        "cluster[{}] task[{}] had no response until timeout",
                        self.cluster_id,
                        task.id()
                    ),
                );
            }
            self.registry.delete(task.id());
        }
    }

    async fn dispatch_ready(&self, stop_rx: &mut watch::Receiver<bool>) {
        let batch = self.registry.list_to_send(unix_seconds(), &self.config);
        if batch.is_empty() {
            // Back-pressure on the tick cadence while idle.
            tokio::select! {
                _ = tokio::time::sleep(self.config.idle_sleep) => {}
                _ = stop_rx.changed() => {}
            }
            return;
        }
        self.send_batch(&batch).await;
    }

    /// Write the batch in order. A connect failure abandons the rest of
    /// the batch (the target is unreachable this tick); a write failure
    /// only skips the task that hit it.
    pub(crate) async fn send_batch(&self, tasks: &[Arc<AdminTask>]) {
        for task in tasks {
            let conn = match self.pool.get(&self.target_addr).await {
                Ok(conn) => conn,
                Err(err) => {
                    update_task_info(task, false);
                    tidefs_monitor::alarm(
                        &format!("{}_{}_sendTask", self.cluster_id, MODULE_NAME),
                        &format!(
                            "cluster[{}] get connection to {} failed: {}",
                            self.cluster_id, self.target_addr, err
                        ),
                    );
                    break;
                }
            };
            match self.send_admin_task(task, &conn).await {
                Ok(()) => {
                    self.pool.put(conn, false).await;
                    update_task_info(task, true);
                }
                Err(err) => {
                    error!(
                        task = task.id(),
                        addr = %self.target_addr,
                        %err,
                        "send admin task failed"
                    );
                    self.pool.put(conn, true).await;
                    update_task_info(task, true);
                }
            }
        }
    }

    fn build_packet(&self, task: &AdminTask) -> Result<Packet, TaskError> {
        let body = serde_json::to_vec(&task.to_frame()).map_err(|source| TaskError::Encode {
            id: task.id().to_string(),
            source,
        })?;
        Ok(Packet::request(task.opcode(), Bytes::from(body)))
    }

    async fn send_admin_task(&self, task: &AdminTask, conn: &C) -> Result<(), TaskError> {
        let pkt = self.build_packet(task)?;
        frame::write_packet(conn, &pkt, self.config.write_deadline).await?;
        debug!(task = task.id(), "sent admin task");
        Ok(())
    }

    /// Synchronous create-partition: write the task and wait for the
    /// reply on the caller's connection. The only admin operation that
    /// observes its reply inline.
    pub async fn sync_create_partition(&self, task: &AdminTask, conn: &C) -> Result<(), TaskError> {
        info!(task = task.id(), "sync create partition begin");
        let pkt = self.build_packet(task)?;
        frame::write_packet(conn, &pkt, self.config.write_deadline).await?;
        let reply = frame::read_packet(conn, self.config.create_partition_deadline).await?;
        if !reply.is_ok() {
            let message = reply.error_message();
            error!(task = task.id(), %message, "create partition rejected");
            return Err(TaskError::RemoteRejected(message));
        }
        info!(task = task.id(), "sync create partition success");
        Ok(())
    }
}

/// Stamp a task after a send attempt. `conn_ok` is false only when no
/// connection could be acquired: the attempt is still counted, but the
/// task stays eligible for the next tick.
fn update_task_info(task: &AdminTask, conn_ok: bool) {
    task.incr_send_count();
    if conn_ok {
        task.set_send_time(unix_seconds());
        task.set_status(TaskStatus::Running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tidefs_net::{NetError, PoolConfig};
    use tidefs_proto::{task_id, Opcode, PacketError, ResultCode};
    use tidefs_types::PartitionId;

    /// Connection double sharing one write log and failure script with
    /// its connector, so writes survive the conn being pooled or closed.
    struct ScriptedConn {
        peer: String,
        shared: Arc<Shared>,
    }

    #[derive(Default)]
    struct Shared {
        written: Mutex<Vec<Bytes>>,
        // Number of upcoming write_all calls that fail.
        fail_writes: AtomicUsize,
        // Frames served to read_exact, drained front to back.
        readable: Mutex<Vec<u8>>,
        connect_attempts: AtomicUsize,
        refuse_connect: AtomicBool,
    }

    #[async_trait]
    impl Conn for ScriptedConn {
        async fn write_all(&self, data: Bytes) -> Result<(), NetError> {
            if self.shared.fail_writes.load(Ordering::SeqCst) > 0 {
                self.shared.fail_writes.fetch_sub(1, Ordering::SeqCst);
                return Err(NetError::Write(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                )));
            }
            self.shared.written.lock().push(data);
            Ok(())
        }

        async fn read_exact(&self, len: usize) -> Result<Bytes, NetError> {
            let mut buf = self.shared.readable.lock();
            if buf.len() < len {
                return Err(NetError::ConnectionClosed);
            }
            let head: Vec<u8> = buf.drain(..len).collect();
            Ok(Bytes::from(head))
        }

        async fn close(&self) {}

        fn peer(&self) -> &str {
            &self.peer
        }
    }

    struct ScriptedConnector {
        shared: Arc<Shared>,
    }

    #[async_trait]
    impl tidefs_net::Connector<ScriptedConn> for ScriptedConnector {
        async fn connect(&self, addr: &str) -> Result<ScriptedConn, NetError> {
            self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);
            if self.shared.refuse_connect.load(Ordering::SeqCst) {
                return Err(NetError::Connect {
                    addr: addr.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "refused",
                    ),
                });
            }
            Ok(ScriptedConn {
                peer: addr.to_string(),
                shared: Arc::clone(&self.shared),
            })
        }
    }

    const TARGET: &str = "10.1.1.1:17030";

    fn sender_with(cluster: &str) -> (Arc<AdminTaskSender<ScriptedConn>>, Arc<Shared>) {
        let shared = Arc::new(Shared::default());
        let connector = Arc::new(ScriptedConnector {
            shared: Arc::clone(&shared),
        });
        let pool = Arc::new(ConnPool::new(connector as _, PoolConfig::default()));
        let sender = AdminTaskSender::new(cluster, TARGET, pool, SenderConfig::default());
        (sender, shared)
    }

    fn make_task(opcode: Opcode, key: u32) -> Arc<AdminTask> {
        Arc::new(AdminTask::new(
            task_id(TARGET, opcode, PartitionId(key)),
            opcode,
            Bytes::new(),
        ))
    }

    fn written_opcodes(shared: &Shared) -> Vec<Opcode> {
        shared
            .written
            .lock()
            .iter()
            .map(|frame| Packet::decode(frame).unwrap().opcode)
            .collect()
    }

    #[tokio::test]
    async fn test_heartbeat_written_before_normal() {
        let (sender, shared) = sender_with("c-prio");
        let normal = make_task(Opcode::DeleteDataPartition, 1);
        let hb = make_task(Opcode::DataNodeHeartbeat, 2);
        sender.put_task(Arc::clone(&normal));
        sender.put_task(Arc::clone(&hb));

        let batch = sender.registry().list_to_send(unix_seconds(), &sender.config);
        sender.send_batch(&batch).await;

        let opcodes = written_opcodes(&shared);
        assert_eq!(opcodes.len(), 2);
        assert_eq!(opcodes[0], Opcode::DataNodeHeartbeat);
        assert_eq!(opcodes[1], Opcode::DeleteDataPartition);
    }

    #[tokio::test]
    async fn test_connect_failure_halts_batch() {
        let (sender, shared) = sender_with("c-connfail");
        shared.refuse_connect.store(true, Ordering::SeqCst);

        let tasks: Vec<_> = (1..=3)
            .map(|i| make_task(Opcode::DeleteDataPartition, i))
            .collect();
        for t in &tasks {
            sender.put_task(Arc::clone(t));
        }

        let batch = sender.registry().list_to_send(unix_seconds(), &sender.config);
        sender.send_batch(&batch).await;

        assert_eq!(shared.connect_attempts.load(Ordering::SeqCst), 1);
        assert!(shared.written.lock().is_empty());

        // Only the first task in the batch was charged an attempt; it
        // keeps send_time = 0 so it stays immediately eligible.
        let counts: Vec<u32> = batch.iter().map(|t| t.send_count()).collect();
        assert_eq!(counts, vec![1, 0, 0]);
        for t in &batch {
            assert_eq!(t.send_time(), 0);
            assert_eq!(t.status(), TaskStatus::Pending);
        }
        assert_eq!(
            tidefs_monitor::counter("c-connfail_master_sendTask_alarm").get(),
            1
        );
    }

    #[tokio::test]
    async fn test_write_failure_continues_batch() {
        let (sender, shared) = sender_with("c-writefail");
        shared.fail_writes.store(1, Ordering::SeqCst);

        let t1 = make_task(Opcode::DeleteDataPartition, 1);
        let t2 = make_task(Opcode::LoadDataPartition, 2);

        let now = unix_seconds();
        sender.send_batch(&[Arc::clone(&t1), Arc::clone(&t2)]).await;

        // The second task's frame still went out.
        assert_eq!(shared.written.lock().len(), 1);
        assert_eq!(t1.send_count(), 1);
        assert_eq!(t2.send_count(), 1);
        assert!(t1.send_time() >= now);
        assert_eq!(t1.status(), TaskStatus::Running);
        assert_eq!(t2.status(), TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_timeout_eviction_warns_once_sent() {
        let (sender, _) = sender_with("c-evict");
        let now = unix_seconds();

        let sent = make_task(Opcode::DeleteDataPartition, 1);
        sent.set_send_time(now - 2 * sender.config.task_timeout_secs);
        sender.put_task(Arc::clone(&sent));

        sender.evict_timed_out();

        assert!(sender.registry().is_empty());
        assert_eq!(
            tidefs_monitor::counter("c-evict_master_taskTimeout_alarm").get(),
            1
        );
    }

    #[tokio::test]
    async fn test_never_sent_task_evicts_without_alarm() {
        let (sender, _) = sender_with("c-evict-silent");
        let worn = make_task(Opcode::DeleteDataPartition, 1);
        for _ in 0..sender.config.max_sends {
            worn.incr_send_count();
        }
        sender.put_task(Arc::clone(&worn));

        sender.evict_timed_out();

        assert!(sender.registry().is_empty());
        assert_eq!(
            tidefs_monitor::counter("c-evict-silent_master_taskTimeout_alarm").get(),
            0
        );
    }

    #[tokio::test]
    async fn test_sent_frame_carries_task_body() {
        let (sender, shared) = sender_with("c-frame");
        let task = make_task(Opcode::DeleteDataPartition, 7);
        sender.send_batch(&[Arc::clone(&task)]).await;

        let frames = shared.written.lock();
        let pkt = Packet::decode(&frames[0]).unwrap();
        let frame: tidefs_proto::AdminTaskFrame = serde_json::from_slice(&pkt.data).unwrap();
        assert_eq!(frame.id, task.id());
        assert_eq!(frame.opcode, Opcode::DeleteDataPartition);
    }

    #[tokio::test]
    async fn test_sync_create_partition_ok() {
        let (sender, shared) = sender_with("c-sync-ok");
        let task = make_task(Opcode::CreateDataPartition, 1);

        let mut reply = Packet::request(Opcode::CreateDataPartition, Bytes::new());
        reply.result_code = ResultCode::OK;
        shared.readable.lock().extend_from_slice(&reply.to_bytes());

        let conn = ScriptedConn {
            peer: TARGET.into(),
            shared: Arc::clone(&shared),
        };
        sender.sync_create_partition(&task, &conn).await.unwrap();
        assert_eq!(shared.written.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_create_partition_rejected() {
        let (sender, shared) = sender_with("c-sync-rej");
        let task = make_task(Opcode::CreateDataPartition, 1);

        let mut reply =
            Packet::request(Opcode::CreateDataPartition, Bytes::from_static(b"no disk fits"));
        reply.result_code = ResultCode::ERR;
        shared.readable.lock().extend_from_slice(&reply.to_bytes());

        let conn = ScriptedConn {
            peer: TARGET.into(),
            shared: Arc::clone(&shared),
        };
        let err = sender.sync_create_partition(&task, &conn).await.unwrap_err();
        match err {
            TaskError::RemoteRejected(msg) => assert_eq!(msg, "no disk fits"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stop_terminates_loop() {
        let (sender, _) = sender_with("c-stop");
        sender.start();
        sender.stop();
        sender.stop();
        // Give the loop a moment to observe the signal and exit.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(*sender.stop_tx.subscribe().borrow());
    }

    #[test]
    fn test_packet_error_is_not_connect_class() {
        // Keeps the batch-abort decision keyed to connection acquisition.
        let err = NetError::Packet(PacketError::BadMagic(1));
        assert!(!err.is_connect());
    }
}
