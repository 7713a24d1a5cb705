//! Poll-tick collection into the agent snapshot.

use crate::agent::runtime::{ProcessSampler, RuntimeSampler};
use crate::core::Result;
use crate::metrics::Snapshot;
use parking_lot::{Mutex, RwLock};

/// Gauge holding a fresh value in `[0, 1)` on every poll
pub const RANDOM_VALUE: &str = "RandomValue";
/// Counter incremented by one on every completed poll
pub const POLL_COUNT: &str = "PollCount";

/// Fills the snapshot from a [`RuntimeSampler`].
pub struct Collector {
    sampler: Mutex<Box<dyn RuntimeSampler>>,
}

impl Collector {
    /// Collector over the real process sampler.
    pub fn new() -> Result<Self> {
        Ok(Self::with_sampler(Box::new(ProcessSampler::new()?)))
    }

    /// Collector over any sampler.
    pub fn with_sampler(sampler: Box<dyn RuntimeSampler>) -> Self {
        Self {
            sampler: Mutex::new(sampler),
        }
    }

    /// Take one sample and store it.
    ///
    /// Sampling happens before the write lock is taken, so a report in
    /// progress is only blocked for the map updates. A failed sample leaves
    /// the snapshot untouched and does not count as a poll.
    pub fn collect(&self, snapshot: &RwLock<Snapshot>) -> Result<()> {
        let stats = self.sampler.lock().sample()?;
        let random: f64 = rand::random();

        let mut snapshot = snapshot.write();
        for (name, value) in stats.gauges() {
            snapshot.set_gauge(name, value);
        }
        snapshot.set_gauge(RANDOM_VALUE, random);
        snapshot.increment_counter(POLL_COUNT, 1);

        Ok(())
    }
}
