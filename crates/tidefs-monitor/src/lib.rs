pub mod metrics;
pub mod registry;

pub use metrics::{Counter, Gauge};
pub use registry::{alarm, counter, gauge, init, Registry};
