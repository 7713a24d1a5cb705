//! The agent's in-memory view of what it has collected since start.

use crate::core::MetricValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot shared between the poll loop (writer) and the report loop (reader).
pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Latest gauges and running counters collected by the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

impl Snapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty snapshot wrapped for sharing between loops
    pub fn shared() -> SharedSnapshot {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Replace a gauge value
    pub fn set_gauge<S: Into<String>>(&mut self, name: S, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    /// Add `by` to a counter, starting from 0
    pub fn increment_counter<S: Into<String>>(&mut self, name: S, by: i64) {
        let total = self.counters.entry(name.into()).or_insert(0);
        *total = total.wrapping_add(by);
    }

    /// Gauge value, if collected
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).copied()
    }

    /// Counter value, if collected
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// All gauges
    pub fn gauges(&self) -> &HashMap<String, f64> {
        &self.gauges
    }

    /// All counters
    pub fn counters(&self) -> &HashMap<String, i64> {
        &self.counters
    }

    /// Every entry as a typed value, gauges first.
    pub fn entries(&self) -> Vec<(String, MetricValue)> {
        let gauges = self
            .gauges
            .iter()
            .map(|(name, v)| (name.clone(), MetricValue::Gauge(*v)));
        let counters = self
            .counters
            .iter()
            .map(|(name, v)| (name.clone(), MetricValue::Counter(*v)));
        gauges.chain(counters).collect()
    }

    /// Number of entries across both kinds
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// True before the first poll
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
