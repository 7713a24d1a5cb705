//! Memory accounting of the agent's own process.
//!
//! Heap figures come from [`CountingAllocator`], which both binaries install
//! as the global allocator. Resident and virtual sizes come from `sysinfo`,
//! the stack segment from `/proc/self/status` on Linux. Fields that only
//! make sense for a garbage-collected runtime are always 0.

use crate::core::{PulseError, Result};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::{Pid, System as SysInfo};

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static FREES: AtomicU64 = AtomicU64::new(0);
static BYTES_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static BYTES_FREED: AtomicU64 = AtomicU64::new(0);

/// Global allocator that counts allocations and bytes on top of [`System`].
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: pulse_lib::agent::CountingAllocator = pulse_lib::agent::CountingAllocator;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingAllocator;

#[inline]
fn record_alloc(size: usize) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    BYTES_ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
}

#[inline]
fn record_free(size: usize) {
    FREES.fetch_add(1, Ordering::Relaxed);
    BYTES_FREED.fetch_add(size as u64, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            // A move counts as one free plus one allocation.
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// Point-in-time reading of the allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorCounters {
    /// Allocations since start
    pub allocations: u64,
    /// Frees since start
    pub frees: u64,
    /// Bytes allocated since start
    pub bytes_allocated: u64,
    /// Bytes freed since start
    pub bytes_freed: u64,
}

impl AllocatorCounters {
    /// Bytes currently live on the heap
    pub fn live_bytes(&self) -> u64 {
        self.bytes_allocated.saturating_sub(self.bytes_freed)
    }

    /// Allocations not yet freed
    pub fn live_objects(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

/// Read the allocator counters. All zero when [`CountingAllocator`] is not
/// the global allocator.
pub fn allocator_counters() -> AllocatorCounters {
    AllocatorCounters {
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        frees: FREES.load(Ordering::Relaxed),
        bytes_allocated: BYTES_ALLOCATED.load(Ordering::Relaxed),
        bytes_freed: BYTES_FREED.load(Ordering::Relaxed),
    }
}

/// Names of the runtime gauges, in reporting order.
pub const RUNTIME_GAUGES: [&str; 27] = [
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Memory statistics of the running process.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeStats {
    pub alloc: u64,
    pub buck_hash_sys: u64,
    pub frees: u64,
    pub gc_cpu_fraction: f64,
    pub gc_sys: u64,
    pub heap_alloc: u64,
    pub heap_idle: u64,
    pub heap_inuse: u64,
    pub heap_objects: u64,
    pub heap_released: u64,
    pub heap_sys: u64,
    pub last_gc: u64,
    pub lookups: u64,
    pub mcache_inuse: u64,
    pub mcache_sys: u64,
    pub mspan_inuse: u64,
    pub mspan_sys: u64,
    pub mallocs: u64,
    pub next_gc: u64,
    pub num_forced_gc: u64,
    pub num_gc: u64,
    pub other_sys: u64,
    pub pause_total_ns: u64,
    pub stack_inuse: u64,
    pub stack_sys: u64,
    pub sys: u64,
    pub total_alloc: u64,
}

impl RuntimeStats {
    /// Combine allocator counters with OS figures (all in bytes).
    pub fn from_parts(
        counters: AllocatorCounters,
        resident: u64,
        virtual_size: u64,
        stack: u64,
    ) -> Self {
        let live = counters.live_bytes();
        Self {
            alloc: live,
            frees: counters.frees,
            heap_alloc: live,
            heap_idle: resident.saturating_sub(live),
            heap_inuse: live,
            heap_objects: counters.live_objects(),
            heap_sys: resident,
            mallocs: counters.allocations,
            other_sys: virtual_size.saturating_sub(resident).saturating_sub(stack),
            stack_inuse: stack,
            stack_sys: stack,
            sys: virtual_size,
            total_alloc: counters.bytes_allocated,
            ..Self::default()
        }
    }

    /// Every field as a named gauge, in [`RUNTIME_GAUGES`] order.
    pub fn gauges(&self) -> [(&'static str, f64); 27] {
        let values = [
            self.alloc as f64,
            self.buck_hash_sys as f64,
            self.frees as f64,
            self.gc_cpu_fraction,
            self.gc_sys as f64,
            self.heap_alloc as f64,
            self.heap_idle as f64,
            self.heap_inuse as f64,
            self.heap_objects as f64,
            self.heap_released as f64,
            self.heap_sys as f64,
            self.last_gc as f64,
            self.lookups as f64,
            self.mcache_inuse as f64,
            self.mcache_sys as f64,
            self.mspan_inuse as f64,
            self.mspan_sys as f64,
            self.mallocs as f64,
            self.next_gc as f64,
            self.num_forced_gc as f64,
            self.num_gc as f64,
            self.other_sys as f64,
            self.pause_total_ns as f64,
            self.stack_inuse as f64,
            self.stack_sys as f64,
            self.sys as f64,
            self.total_alloc as f64,
        ];

        std::array::from_fn(|i| (RUNTIME_GAUGES[i], values[i]))
    }
}

/// Source of [`RuntimeStats`]. Swapped for a fake in tests.
pub trait RuntimeSampler: Send {
    /// Take one reading.
    fn sample(&mut self) -> Result<RuntimeStats>;
}

/// Samples the current process through the allocator counters and `sysinfo`.
pub struct ProcessSampler {
    system: SysInfo,
    pid: Pid,
}

impl ProcessSampler {
    /// Create a sampler for the current process.
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| PulseError::storage(format!("failed to get current pid: {e}")))?;
        Ok(Self {
            system: SysInfo::new(),
            pid,
        })
    }
}

impl RuntimeSampler for ProcessSampler {
    fn sample(&mut self) -> Result<RuntimeStats> {
        if !self.system.refresh_process(self.pid) {
            return Err(PulseError::storage(format!(
                "process {} not found while sampling memory",
                self.pid
            )));
        }
        let (resident, virtual_size) = self
            .system
            .process(self.pid)
            .map(|p| (p.memory(), p.virtual_memory()))
            .unwrap_or_default();

        Ok(RuntimeStats::from_parts(
            allocator_counters(),
            resident,
            virtual_size,
            stack_bytes(),
        ))
    }
}

#[cfg(target_os = "linux")]
fn stack_bytes() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .map(|status| parse_vm_stk(&status))
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn stack_bytes() -> u64 {
    0
}

/// Extract `VmStk` (reported in kB) from `/proc/<pid>/status` content, in bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_stk(status: &str) -> u64 {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmStk:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map_or(0, |kb| kb.saturating_mul(1024))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_follow_name_order() {
        let stats = RuntimeStats {
            alloc: 1,
            total_alloc: 27,
            ..RuntimeStats::default()
        };
        let gauges = stats.gauges();

        let names: Vec<&str> = gauges.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, RUNTIME_GAUGES);
        assert_eq!(gauges[0], ("Alloc", 1.0));
        assert_eq!(gauges[26], ("TotalAlloc", 27.0));
    }

    #[test]
    fn test_from_parts_mapping() {
        let counters = AllocatorCounters {
            allocations: 10,
            frees: 4,
            bytes_allocated: 4096,
            bytes_freed: 1024,
        };
        let stats = RuntimeStats::from_parts(counters, 10_000, 50_000, 2_000);

        assert_eq!(stats.alloc, 3072);
        assert_eq!(stats.heap_alloc, 3072);
        assert_eq!(stats.heap_inuse, 3072);
        assert_eq!(stats.heap_objects, 6);
        assert_eq!(stats.heap_sys, 10_000);
        assert_eq!(stats.heap_idle, 10_000 - 3072);
        assert_eq!(stats.mallocs, 10);
        assert_eq!(stats.frees, 4);
        assert_eq!(stats.total_alloc, 4096);
        assert_eq!(stats.stack_inuse, 2_000);
        assert_eq!(stats.sys, 50_000);
        assert_eq!(stats.other_sys, 38_000);
        assert_eq!(stats.num_gc, 0);
        assert_eq!(stats.gc_cpu_fraction, 0.0);
    }

    #[test]
    fn test_from_parts_saturates() {
        let counters = AllocatorCounters {
            allocations: 1,
            frees: 2,
            bytes_allocated: 10,
            bytes_freed: 20,
        };
        let stats = RuntimeStats::from_parts(counters, 0, 0, 100);
        assert_eq!(stats.alloc, 0);
        assert_eq!(stats.heap_objects, 0);
        assert_eq!(stats.other_sys, 0);
    }

    #[test]
    fn test_parse_vm_stk() {
        let status = "Name:\tpulse-agent\nVmRSS:\t    5120 kB\nVmStk:\t     132 kB\n";
        assert_eq!(parse_vm_stk(status), 132 * 1024);
        assert_eq!(parse_vm_stk("Name:\tx\n"), 0);
    }

    #[test]
    fn test_process_sampler_reads_memory() {
        let mut sampler = ProcessSampler::new().unwrap();
        let stats = sampler.sample().unwrap();
        assert!(stats.heap_sys > 0);
        assert!(stats.sys >= stats.heap_sys);
    }
}
