use crate::error::{CacheError, ResourceKind};
use crate::metrics::{names, MetricsSink, NoopSink};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-wide counters of active and cumulative pattern/matcher
/// allocations, and the enforcement of `max_simultaneous_compiled_patterns`.
///
/// Every counter is a single `AtomicUsize`/`AtomicU64` rather than a
/// contention-spreading counter (e.g. sharded per-core counters merged on
/// read), because the pattern cache's compile/close rate is orders of
/// magnitude lower than its match rate (which never touches this struct at
/// all), so there is no realistic contention to spread.
#[derive(Debug)]
pub struct ResourceTracker {
    active_patterns: AtomicUsize,
    active_matchers: AtomicUsize,
    compiled_total: AtomicU64,
    closed_total: AtomicU64,
    matchers_created_total: AtomicU64,
    matchers_closed_total: AtomicU64,
    pattern_rejections_total: AtomicU64,
    matcher_rejections_total: AtomicU64,
    metrics: Arc<dyn MetricsSink>,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl ResourceTracker {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            active_patterns: AtomicUsize::new(0),
            active_matchers: AtomicUsize::new(0),
            compiled_total: AtomicU64::new(0),
            closed_total: AtomicU64::new(0),
            matchers_created_total: AtomicU64::new(0),
            matchers_closed_total: AtomicU64::new(0),
            pattern_rejections_total: AtomicU64::new(0),
            matcher_rejections_total: AtomicU64::new(0),
            metrics,
        }
    }

    /// Atomically increments `active_patterns`; if the post-increment value
    /// exceeds `max`, rolls back and returns `ResourceExhausted`.
    ///
    /// Tie-break: under concurrent `acquire_pattern` calls near the limit,
    /// whichever thread's fetch-add observes a post-increment value `<=
    /// max` keeps its slot; every other thread observes a higher value and
    /// rolls back. No retrying is performed here — a caller that loses the
    /// race gets `ResourceExhausted` immediately.
    pub fn acquire_pattern(&self, max: usize) -> Result<(), CacheError> {
        let prev = self.active_patterns.fetch_add(1, Ordering::AcqRel);
        if prev + 1 > max {
            self.active_patterns.fetch_sub(1, Ordering::AcqRel);
            self.pattern_rejections_total.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .increment_counter(names::ERRORS_RESOURCE_EXHAUSTED_TOTAL, 1);
            return Err(CacheError::resource_exhausted(ResourceKind::Pattern));
        }
        self.compiled_total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn release_pattern(&self) {
        self.active_patterns.fetch_sub(1, Ordering::AcqRel);
        self.closed_total.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .increment_counter(names::RESOURCES_PATTERNS_FREED_TOTAL, 1);
    }

    /// Same tie-break rule as [`Self::acquire_pattern`], scoped to a single
    /// entry's matcher ceiling rather than the process-wide pattern ceiling.
    pub fn acquire_matcher(&self, current: &AtomicUsize, max: usize) -> Result<(), CacheError> {
        let prev = current.fetch_add(1, Ordering::AcqRel);
        if prev + 1 > max {
            current.fetch_sub(1, Ordering::AcqRel);
            self.matcher_rejections_total.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .increment_counter(names::ERRORS_RESOURCE_EXHAUSTED_TOTAL, 1);
            return Err(CacheError::resource_exhausted(ResourceKind::Matcher));
        }
        self.active_matchers.fetch_add(1, Ordering::AcqRel);
        self.matchers_created_total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn release_matcher(&self, current: &AtomicUsize) {
        current.fetch_sub(1, Ordering::AcqRel);
        self.active_matchers.fetch_sub(1, Ordering::AcqRel);
        self.matchers_closed_total.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .increment_counter(names::RESOURCES_MATCHERS_FREED_TOTAL, 1);
    }

    pub fn active_patterns(&self) -> usize {
        self.active_patterns.load(Ordering::Acquire)
    }

    pub fn active_matchers(&self) -> usize {
        self.active_matchers.load(Ordering::Acquire)
    }

    pub fn compiled_total(&self) -> u64 {
        self.compiled_total.load(Ordering::Relaxed)
    }

    pub fn closed_total(&self) -> u64 {
        self.closed_total.load(Ordering::Relaxed)
    }

    pub fn pattern_rejections_total(&self) -> u64 {
        self.pattern_rejections_total.load(Ordering::Relaxed)
    }

    pub fn matcher_rejections_total(&self) -> u64 {
        self.matcher_rejections_total.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.active_patterns.store(0, Ordering::Release);
        self.active_matchers.store(0, Ordering::Release);
        self.compiled_total.store(0, Ordering::Relaxed);
        self.closed_total.store(0, Ordering::Relaxed);
        self.matchers_created_total.store(0, Ordering::Relaxed);
        self.matchers_closed_total.store(0, Ordering::Relaxed);
        self.pattern_rejections_total.store(0, Ordering::Relaxed);
        self.matcher_rejections_total.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_release_round_trips() {
        let tracker = ResourceTracker::default();
        tracker.acquire_pattern(10).unwrap();
        assert_eq!(tracker.active_patterns(), 1);
        tracker.release_pattern();
        assert_eq!(tracker.active_patterns(), 0);
    }

    #[test]
    fn rejects_beyond_limit_with_no_side_effects() {
        let tracker = ResourceTracker::default();
        for _ in 0..10 {
            tracker.acquire_pattern(10).unwrap();
        }
        let err = tracker.acquire_pattern(10).unwrap_err();
        assert!(matches!(err, CacheError::ResourceExhausted { .. }));
        assert_eq!(tracker.active_patterns(), 10);
    }

    #[test]
    fn cumulative_not_enforced_after_release() {
        let tracker = ResourceTracker::default();
        for _ in 0..10 {
            tracker.acquire_pattern(10).unwrap();
        }
        assert!(tracker.acquire_pattern(10).is_err());
        for _ in 0..10 {
            tracker.release_pattern();
        }
        for _ in 0..10 {
            tracker.acquire_pattern(10).unwrap();
        }
        assert_eq!(tracker.active_patterns(), 10);
        assert_eq!(tracker.compiled_total(), 20);
    }

    #[test]
    fn matcher_ceiling_is_scoped_per_entry() {
        let tracker = Arc::new(ResourceTracker::default());
        let counter_a = Arc::new(AtomicUsize::new(0));
        let counter_b = Arc::new(AtomicUsize::new(0));
        tracker.acquire_matcher(&counter_a, 1).unwrap();
        // A second entry's independent counter is unaffected by A's ceiling.
        tracker.acquire_matcher(&counter_b, 1).unwrap();
        assert!(tracker.acquire_matcher(&counter_a, 1).is_err());
        assert_eq!(tracker.active_matchers(), 2);
    }

    #[test]
    fn concurrent_acquire_near_limit_has_exactly_one_winner_per_slot() {
        let tracker = Arc::new(ResourceTracker::default());
        let successes = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let successes = Arc::clone(&successes);
                thread::spawn(move || {
                    if tracker.acquire_pattern(10).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(successes.load(Ordering::SeqCst), 10);
        assert_eq!(tracker.active_patterns(), 10);
    }
}
