//! Cache statistics: an atomic counter set plus an immutable snapshot type.
//!
//! Hits and misses are `AtomicU64`s with `hit_rate`/`miss_rate` derived on
//! read; eviction, deferred-queue, and native-memory figures are tracked
//! alongside them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on the cache's hot and maintenance paths.
///
/// `Relaxed` ordering throughout: these are independent tallies with no
/// cross-field invariant to preserve between a write and a subsequent read.
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions_lru: AtomicU64,
    evictions_idle: AtomicU64,
    evictions_deferred: AtomicU64,
    invalid_pattern_recompilations: AtomicU64,
    native_memory_bytes: AtomicU64,
    peak_native_memory_bytes: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction_lru(&self) {
        self.evictions_lru.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction_idle(&self) {
        self.evictions_idle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction_deferred(&self) {
        self.evictions_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_pattern_recompilation(&self) {
        self.invalid_pattern_recompilations
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Adjusts the tracked native-memory total by `delta` (which may be
    /// negative, encoded via wrapping arithmetic) and bumps the peak if the
    /// new total exceeds it.
    pub fn add_native_memory(&self, delta_bytes: i64) {
        let new_total = if delta_bytes >= 0 {
            self.native_memory_bytes
                .fetch_add(delta_bytes as u64, Ordering::AcqRel)
                + delta_bytes as u64
        } else {
            self.native_memory_bytes
                .fetch_sub((-delta_bytes) as u64, Ordering::AcqRel)
                .saturating_sub((-delta_bytes) as u64)
        };
        let mut peak = self.peak_native_memory_bytes.load(Ordering::Acquire);
        while new_total > peak {
            match self.peak_native_memory_bytes.compare_exchange_weak(
                peak,
                new_total,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    /// Produces an immutable point-in-time snapshot. `current_size`,
    /// `max_size`, `deferred_size`, and `deferred_bytes` come from the
    /// caller since they live on the map and deferred queue respectively,
    /// not in this counter set.
    pub fn snapshot(
        &self,
        current_size: usize,
        max_size: usize,
        deferred_size: usize,
    ) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions_lru: self.evictions_lru.load(Ordering::Relaxed),
            evictions_idle: self.evictions_idle.load(Ordering::Relaxed),
            evictions_deferred: self.evictions_deferred.load(Ordering::Relaxed),
            invalid_pattern_recompilations: self
                .invalid_pattern_recompilations
                .load(Ordering::Relaxed),
            current_size,
            max_size,
            deferred_size,
            native_memory_bytes: self.native_memory_bytes.load(Ordering::Acquire),
            peak_native_memory_bytes: self.peak_native_memory_bytes.load(Ordering::Acquire),
        }
    }

    pub fn native_memory_bytes(&self) -> u64 {
        self.native_memory_bytes.load(Ordering::Acquire)
    }

    pub fn peak_native_memory_bytes(&self) -> u64 {
        self.peak_native_memory_bytes.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions_lru.store(0, Ordering::Relaxed);
        self.evictions_idle.store(0, Ordering::Relaxed);
        self.evictions_deferred.store(0, Ordering::Relaxed);
        self.invalid_pattern_recompilations
            .store(0, Ordering::Relaxed);
        self.native_memory_bytes.store(0, Ordering::Relaxed);
        self.peak_native_memory_bytes.store(0, Ordering::Relaxed);
    }
}

/// An immutable, consistent-at-the-instant-of-capture view of cache state,
/// returned by `PatternCache::statistics()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions_lru: u64,
    pub evictions_idle: u64,
    pub evictions_deferred: u64,
    pub invalid_pattern_recompilations: u64,
    pub current_size: usize,
    pub max_size: usize,
    pub deferred_size: usize,
    pub native_memory_bytes: u64,
    pub peak_native_memory_bytes: u64,
}

impl CacheStatistics {
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }

    pub fn total_evictions(&self) -> u64 {
        self.evictions_lru + self.evictions_idle + self.evictions_deferred
    }

    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.current_size as f64 / self.max_size as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_and_miss_rate_cover_all_requests() {
        let counters = StatsCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        let snap = counters.snapshot(2, 10, 0);
        assert_eq!(snap.total_requests(), 3);
        assert!((snap.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((snap.miss_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_have_zero_rates_not_nan() {
        let counters = StatsCounters::new();
        let snap = counters.snapshot(0, 10, 0);
        assert_eq!(snap.hit_rate(), 0.0);
        assert_eq!(snap.miss_rate(), 0.0);
    }

    #[test]
    fn total_evictions_sums_all_three_kinds() {
        let counters = StatsCounters::new();
        counters.record_eviction_lru();
        counters.record_eviction_idle();
        counters.record_eviction_idle();
        counters.record_eviction_deferred();
        let snap = counters.snapshot(0, 10, 0);
        assert_eq!(snap.total_evictions(), 4);
    }

    #[test]
    fn native_memory_tracks_current_and_peak_through_growth_and_shrink() {
        let counters = StatsCounters::new();
        counters.add_native_memory(1000);
        counters.add_native_memory(500);
        counters.add_native_memory(-700);
        let snap = counters.snapshot(0, 10, 0);
        assert_eq!(snap.native_memory_bytes, 800);
        assert_eq!(snap.peak_native_memory_bytes, 1500);
    }

    #[test]
    fn utilization_is_current_over_max() {
        let counters = StatsCounters::new();
        let snap = counters.snapshot(25, 100, 0);
        assert!((snap.utilization() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_every_counter() {
        let counters = StatsCounters::new();
        counters.record_hit();
        counters.record_eviction_lru();
        counters.add_native_memory(1000);
        counters.reset();
        let snap = counters.snapshot(0, 10, 0);
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.evictions_lru, 0);
        assert_eq!(snap.native_memory_bytes, 0);
    }
}
