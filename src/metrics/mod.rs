//! Metric containers: the server's authoritative store and the agent's
//! snapshot.

pub mod snapshot;
pub mod storage;

pub use snapshot::{SharedSnapshot, Snapshot};
pub use storage::{MemStorage, MetricsBackend};
