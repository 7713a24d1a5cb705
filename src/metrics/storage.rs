//! In-memory metric store backing the server.
//!
//! Both per-kind maps live behind a single reader/writer lock. Writes take
//! the lock exclusively, point reads share it, and list operations copy the
//! map out so callers iterate without holding the lock.

use crate::core::{MetricName, MetricValue};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage operations the HTTP surface depends on.
pub trait MetricsBackend: Send + Sync {
    /// Replace the gauge `name` with `value`.
    fn update_gauge(&self, name: &MetricName, value: f64);

    /// Add `delta` to the counter `name`, starting from 0 when absent.
    fn update_counter(&self, name: &MetricName, delta: i64);

    /// Current gauge value, if present.
    fn gauge(&self, name: &str) -> Option<f64>;

    /// Accumulated counter total, if present.
    fn counter(&self, name: &str) -> Option<i64>;

    /// Copy of all gauges.
    fn list_gauges(&self) -> HashMap<String, f64>;

    /// Copy of all counters.
    fn list_counters(&self) -> HashMap<String, i64>;

    /// Apply a typed update, dispatching on its kind.
    fn apply(&self, name: &MetricName, value: MetricValue) {
        match value {
            MetricValue::Gauge(v) => self.update_gauge(name, v),
            MetricValue::Counter(delta) => self.update_counter(name, delta),
        }
    }
}

#[derive(Debug, Default)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// Default in-memory store.
#[derive(Debug, Default)]
pub struct MemStorage {
    maps: RwLock<Maps>,
}

impl MemStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across both kinds
    pub fn len(&self) -> usize {
        let maps = self.maps.read();
        maps.gauges.len() + maps.counters.len()
    }

    /// True when nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsBackend for MemStorage {
    fn update_gauge(&self, name: &MetricName, value: f64) {
        self.maps
            .write()
            .gauges
            .insert(name.as_str().to_owned(), value);
    }

    fn update_counter(&self, name: &MetricName, delta: i64) {
        let mut maps = self.maps.write();
        let total = maps.counters.entry(name.as_str().to_owned()).or_insert(0);
        *total = total.wrapping_add(delta);
    }

    fn gauge(&self, name: &str) -> Option<f64> {
        self.maps.read().gauges.get(name).copied()
    }

    fn counter(&self, name: &str) -> Option<i64> {
        self.maps.read().counters.get(name).copied()
    }

    fn list_gauges(&self) -> HashMap<String, f64> {
        self.maps.read().gauges.clone()
    }

    fn list_counters(&self) -> HashMap<String, i64> {
        self.maps.read().counters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn name(s: &str) -> MetricName {
        MetricName::new(s).unwrap()
    }

    #[test]
    fn test_gauge_replaces() {
        let store = MemStorage::new();
        for v in [1.0, -3.5, 23.5, 25.0] {
            store.update_gauge(&name("t"), v);
        }
        assert_eq!(store.gauge("t"), Some(25.0));
    }

    #[test]
    fn test_counter_accumulates() {
        let store = MemStorage::new();
        let deltas = [100, 50, -20, 7];
        for d in deltas {
            store.update_counter(&name("requests"), d);
        }
        assert_eq!(store.counter("requests"), Some(deltas.iter().sum()));
    }

    #[test]
    fn test_counter_wraps_on_overflow() {
        let store = MemStorage::new();
        store.update_counter(&name("c"), i64::MAX);
        store.update_counter(&name("c"), 1);
        assert_eq!(store.counter("c"), Some(i64::MIN));
    }

    #[test]
    fn test_missing_metric() {
        let store = MemStorage::new();
        assert!(store.is_empty());
        assert_eq!(store.gauge("missing"), None);
        assert_eq!(store.counter("missing"), None);
    }

    #[test]
    fn test_kinds_are_independent() {
        let store = MemStorage::new();
        store.update_gauge(&name("X"), 1.5);
        store.update_counter(&name("X"), 3);

        assert_eq!(store.gauge("X"), Some(1.5));
        assert_eq!(store.counter("X"), Some(3));
        assert_eq!(store.len(), 2);
        assert_eq!(store.gauge("x"), None);
    }

    #[test]
    fn test_list_returns_isolated_copy() {
        let store = MemStorage::new();
        store.update_gauge(&name("a"), 1.0);
        store.update_counter(&name("b"), 1);

        let gauges = store.list_gauges();
        let counters = store.list_counters();

        store.update_gauge(&name("a"), 2.0);
        store.update_gauge(&name("c"), 3.0);
        store.update_counter(&name("b"), 10);

        assert_eq!(gauges.len(), 1);
        assert_eq!(gauges.get("a"), Some(&1.0));
        assert_eq!(counters.get("b"), Some(&1));
    }

    #[test]
    fn test_apply_dispatches_on_kind() {
        let store = MemStorage::new();
        store.apply(&name("g"), MetricValue::Gauge(0.5));
        store.apply(&name("c"), MetricValue::Counter(2));
        store.apply(&name("c"), MetricValue::Counter(2));

        assert_eq!(store.gauge("g"), Some(0.5));
        assert_eq!(store.counter("c"), Some(4));
    }

    #[test]
    fn test_concurrent_counter_updates_are_not_lost() {
        const THREADS: i64 = 8;
        const PER_THREAD: i64 = 1_000;

        let store = Arc::new(MemStorage::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let counter = name("hits");
                    for _ in 0..PER_THREAD {
                        store.update_counter(&counter, 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.counter("hits"), Some(THREADS * PER_THREAD));
    }
}
