use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::warn;

use crate::metrics::{Counter, Gauge};

/// Named metric registry for one process.
///
/// Metric names are prefixed with `<app>_<role>` so the same binary
/// family can share dashboards. Registration is load-or-store: asking
/// for an existing name returns the existing cell.
#[derive(Debug)]
pub struct Registry {
    namespace: String,
    counters: DashMap<String, Arc<Counter>>,
    gauges: DashMap<String, Arc<Gauge>>,
}

impl Registry {
    pub fn new(app: &str, role: &str) -> Self {
        Self {
            namespace: format!("{}_{}", app, role),
            counters: DashMap::new(),
            gauges: DashMap::new(),
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}_{}", self.namespace, name)
    }

    pub fn counter(&self, name: &str) -> Arc<Counter> {
        let key = self.qualified(name);
        self.counters
            .entry(key)
            .or_insert_with(|| Arc::new(Counter::new()))
            .clone()
    }

    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        let key = self.qualified(name);
        self.gauges
            .entry(key)
            .or_insert_with(|| Arc::new(Gauge::new()))
            .clone()
    }

    /// Raise an operator-facing alarm: bump the `<key>_alarm` counter
    /// and emit a structured warning. The key is the aggregation handle
    /// dashboards group by; the detail is free-form.
    pub fn alarm(&self, key: &str, detail: &str) {
        self.counter(&format!("{}_alarm", key)).increment();
        warn!(target: "tidefs::alarm", key, "{}", detail);
    }

    /// Snapshot of all counter names and values, for export surfaces.
    pub fn counter_snapshot(&self) -> Vec<(String, u64)> {
        self.counters
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect()
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Install the process-wide registry. Called once at boot; later calls
/// keep the first registry.
pub fn init(app: &str, role: &str) -> &'static Registry {
    REGISTRY.get_or_init(|| Registry::new(app, role))
}

fn global() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry::new("tidefs", "node"))
}

/// Counter from the process-wide registry.
pub fn counter(name: &str) -> Arc<Counter> {
    global().counter(name)
}

/// Gauge from the process-wide registry.
pub fn gauge(name: &str) -> Arc<Gauge> {
    global().gauge(name)
}

/// Alarm through the process-wide registry.
pub fn alarm(key: &str, detail: &str) {
    global().alarm(key, detail);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_store_returns_same_cell() {
        let reg = Registry::new("tidefs", "master");
        let a = reg.counter("send_task");
        let b = reg.counter("send_task");
        a.increment();
        assert_eq!(b.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_namespace_prefix() {
        let reg = Registry::new("tidefs", "datanode");
        reg.counter("flush").increment();
        let snapshot = reg.counter_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "tidefs_datanode_flush");
    }

    #[test]
    fn test_alarm_bumps_counter() {
        let reg = Registry::new("tidefs", "master");
        reg.alarm("c1_sendTask", "get connection to 10.0.0.1 failed");
        reg.alarm("c1_sendTask", "get connection to 10.0.0.1 failed");
        assert_eq!(reg.counter("c1_sendTask_alarm").get(), 2);
    }

    #[test]
    fn test_gauge_registration() {
        let reg = Registry::new("tidefs", "master");
        reg.gauge("start_time").set(42);
        assert_eq!(reg.gauge("start_time").get(), 42);
    }
}
