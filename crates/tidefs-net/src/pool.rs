use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Deserialize;

use crate::conn::{Conn, Connector};
use crate::error::NetError;

/// Tunables for the connection pool.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Dial budget for a new connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Idle connections older than this are discarded instead of reused.
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl: Duration,

    /// Idle connections kept per target beyond this count push out the
    /// oldest one.
    #[serde(default = "default_max_idle_per_target")]
    pub max_idle_per_target: usize,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_idle_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_max_idle_per_target() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            idle_ttl: default_idle_ttl(),
            max_idle_per_target: default_max_idle_per_target(),
        }
    }
}

struct IdleConn<C> {
    conn: C,
    since: Instant,
}

/// Pool of reusable connections keyed by target address.
///
/// `get` hands out exclusive ownership; callers return the connection
/// with `put`, passing `force_close = true` after any transport error
/// so a possibly-poisoned connection never re-enters the pool. A `get`
/// that fails never returns a partially-dialed connection.
pub struct ConnPool<C: Conn> {
    connector: Arc<dyn Connector<C>>,
    config: PoolConfig,
    idle: DashMap<String, VecDeque<IdleConn<C>>>,
}

impl<C: Conn> ConnPool<C> {
    pub fn new(connector: Arc<dyn Connector<C>>, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            idle: DashMap::new(),
        }
    }

    /// Return a healthy idle connection for `addr` or dial a new one.
    pub async fn get(&self, addr: &str) -> Result<C, NetError> {
        let mut reused = None;
        let mut stale = Vec::new();
        if let Some(mut queue) = self.idle.get_mut(addr) {
            while let Some(idle) = queue.pop_front() {
                if idle.since.elapsed() < self.config.idle_ttl {
                    reused = Some(idle.conn);
                    break;
                }
                stale.push(idle.conn);
            }
        }
        // Close expired connections outside the map guard.
        if !stale.is_empty() {
            tracing::debug!(addr, discarded = stale.len(), "dropping idle connections past ttl");
        }
        for conn in stale {
            conn.close().await;
        }
        if let Some(conn) = reused {
            return Ok(conn);
        }

        match tokio::time::timeout(self.config.connect_timeout, self.connector.connect(addr)).await
        {
            Ok(result) => result,
            Err(_) => Err(NetError::ConnectTimeout {
                addr: addr.to_string(),
                timeout: self.config.connect_timeout,
            }),
        }
    }

    /// Return a connection to the pool, or close it.
    pub async fn put(&self, conn: C, force_close: bool) {
        if force_close {
            conn.close().await;
            return;
        }
        let addr = conn.peer().to_string();
        let evicted = {
            let mut queue = self.idle.entry(addr).or_default();
            queue.push_back(IdleConn {
                conn,
                since: Instant::now(),
            });
            if queue.len() > self.config.max_idle_per_target {
                queue.pop_front()
            } else {
                None
            }
        };
        if let Some(idle) = evicted {
            idle.conn.close().await;
        }
    }

    /// Number of idle connections currently parked for `addr`.
    pub fn idle_count(&self, addr: &str) -> usize {
        self.idle.get(addr).map(|q| q.len()).unwrap_or(0)
    }
}
