use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::cache::ChunkCacheStats;

/// Point-in-time view of the streaming core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub load_queue: usize,
    pub update_queue: usize,
    pub loads_in_flight: usize,
    pub updates_in_flight: usize,
    pub loads_dropped: u64,
    pub updates_dropped: u64,
    pub loads_completed: u64,
    pub load_failures: u64,
    pub updates_completed: u64,
    pub publishes: u64,
    pub published: usize,
    pub render_tasks_pending: usize,
    /// Retired chunks whose edits wait for a successful write-back.
    pub unsaved: usize,
    pub cache: ChunkCacheStats,
}

/// Counters bumped by workers and the publisher.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub loads_in_flight: AtomicUsize,
    pub updates_in_flight: AtomicUsize,
    pub loads_completed: AtomicU64,
    pub load_failures: AtomicU64,
    pub updates_completed: AtomicU64,
    pub publishes: AtomicU64,
}

impl Counters {
    #[inline]
    pub fn bump(c: &AtomicU64) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(c: &AtomicU64) -> u64 {
        c.load(Ordering::Relaxed)
    }
}

/// Increments an in-flight gauge for the lifetime of the guard.
pub(crate) struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    pub fn enter(gauge: &'a AtomicUsize) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
