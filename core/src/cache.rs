//! `PatternCache`: the central component tying the map, resource tracker,
//! deferred queue, statistics, and background worker together.
//!
//! A concurrent `DashMap` keyed by pattern, refcounted entries, and an
//! out-of-line background worker replace a simpler `RwLock<HashMap>` with
//! synchronous eviction once entries must survive concurrent use.

use crate::config::CacheConfig;
use crate::deferred_queue::DeferredQueue;
use crate::engine::{Engine, EngineHandle};
use crate::entry::{CachedEntry, PatternKey};
use crate::error::CacheError;
use crate::matcher::{EntryRef, MatcherHandle, OwnedEntry};
use crate::metrics::names;
use crate::resource_tracker::ResourceTracker;
use crate::stats::{CacheStatistics, StatsCounters};
use crate::worker::EvictionWorker;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

enum EvictionReason {
    Lru,
    Idle,
}

/// Thread-safe cache of compiled patterns, refcounted and eviction-managed
/// per the invariants described alongside [`crate::entry::CachedEntry`].
pub struct PatternCache<E: Engine> {
    engine: E,
    map: DashMap<PatternKey, Arc<CachedEntry<E::Handle>>>,
    config: CacheConfig,
    tracker: Arc<ResourceTracker>,
    deferred: Arc<DeferredQueue<E::Handle>>,
    stats: Arc<StatsCounters>,
    worker: Mutex<Option<EvictionWorker>>,
    shut_down: AtomicBool,
}

impl<E: Engine + 'static> PatternCache<E> {
    /// Builds a cache and, if `config.cache_enabled`, spawns its background
    /// maintenance worker immediately.
    pub fn new(engine: E, config: CacheConfig) -> Arc<Self> {
        let cache = Arc::new(Self {
            engine,
            map: DashMap::new(),
            tracker: Arc::new(ResourceTracker::new(Arc::clone(&config.metrics))),
            deferred: Arc::new(DeferredQueue::new()),
            stats: Arc::new(StatsCounters::new()),
            worker: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            config,
        });

        Self::register_gauges(&cache);

        if cache.config.cache_enabled {
            let weak = Arc::downgrade(&cache);
            let tick_interval = cache
                .config
                .deferred_cleanup_interval
                .min(cache.config.eviction_scan_interval);
            let last_idle_scan = Mutex::new(Instant::now());
            let scan_interval = cache.config.eviction_scan_interval;
            let worker = EvictionWorker::spawn(tick_interval, move || {
                if let Some(cache) = weak.upgrade() {
                    // `evictionsDeferred` is recorded once, in `evict_key`, at
                    // the moment an entry is pushed here — the sweep's job is
                    // destroying entries whose refcount has since reached
                    // zero, not re-counting an eviction that already happened.
                    cache.deferred.sweep();

                    let mut last = last_idle_scan.lock();
                    if last.elapsed() >= scan_interval {
                        cache.run_idle_scan();
                        cache.run_lru_eviction();
                        *last = Instant::now();
                    }
                }
            });
            *cache.worker.lock() = Some(worker);
        }

        cache
    }

    /// Looks up `text`/`case_sensitive` in the cache, compiling and
    /// inserting it on a miss. Returns a matcher bound to the resulting
    /// entry, subject to `max_matchers_per_pattern`.
    ///
    /// When caching is disabled, compiles a fresh, untracked-by-the-map
    /// entry whose lifetime is scoped entirely to the returned handle.
    pub fn get_or_compile(
        &self,
        text: &str,
        case_sensitive: bool,
    ) -> Result<MatcherHandle<E::Handle>, CacheError> {
        let key = PatternKey::new(text, case_sensitive);

        if !self.config.cache_enabled {
            let entry = self.compile_entry(&key)?;
            entry.increment_refcount();
            return self.bind_matcher(entry);
        }

        if let Some(guard) = self.map.get(&key) {
            if self.config.validate_cached_patterns && !guard.value().handle.is_valid() {
                drop(guard);
                self.invalidate_key(&key);
                self.stats.record_invalid_pattern_recompilation();
                return self.get_or_insert_on_miss(key);
            }

            // Refcount is incremented while `guard` (the DashMap shard read
            // lock) is still held, so the entry cannot be concurrently
            // evicted-and-freed between proving reachability and recording
            // our interest in it.
            guard.value().increment_refcount();
            guard.value().touch();
            let entry = Arc::clone(guard.value());
            drop(guard);
            self.stats.record_hit();
            self.config.metrics.increment_counter(names::CACHE_HITS_TOTAL, 1);
            return self.bind_matcher(entry);
        }

        self.get_or_insert_on_miss(key)
    }

    /// Takes the `DashMap` entry's shard write lock for `key` and resolves
    /// either branch. Threads racing on the *same* key block here for the
    /// duration of whichever compile wins, so only the winner's branch
    /// records a miss — every loser observes `Occupied` and records a hit,
    /// which is why the fast `map.get` check above must not itself record
    /// a miss before reaching this point.
    fn get_or_insert_on_miss(
        &self,
        key: PatternKey,
    ) -> Result<MatcherHandle<E::Handle>, CacheError> {
        match self.map.entry(key.clone()) {
            MapEntry::Occupied(occupied) => {
                let entry = Arc::clone(occupied.get());
                entry.increment_refcount();
                entry.touch();
                drop(occupied);
                self.stats.record_hit();
                self.config.metrics.increment_counter(names::CACHE_HITS_TOTAL, 1);
                self.bind_matcher(entry)
            }
            MapEntry::Vacant(vacant) => {
                self.stats.record_miss();
                self.config.metrics.increment_counter(names::CACHE_MISSES_TOTAL, 1);
                let entry = self.compile_entry(&key)?;
                entry.increment_refcount();
                self.stats.add_native_memory(entry.size_bytes as i64);
                // `insert`'s returned guard is a temporary, dropped at the
                // end of this statement, so the shard write lock it holds is
                // released before the overflow check below takes its own
                // (read) lock on `self.map`.
                vacant.insert(Arc::clone(&entry));
                // Component #8 is "triggered on overflow", not just on the
                // periodic worker tick: without this, a burst of misses
                // leaves the map oversized until the next
                // `eviction_scan_interval`, which can be far longer than the
                // "briefly exceed" the soft bound promises.
                if self.map.len() > self.config.max_cache_size {
                    self.run_lru_eviction();
                }
                self.bind_matcher(entry)
            }
        }
    }

    /// Compiles a new entry outside of the cache map entirely: no
    /// insertion, no eviction, no refcounting beyond what the returned
    /// handle needs.
    pub fn compile_without_cache(
        &self,
        text: &str,
        case_sensitive: bool,
    ) -> Result<OwnedEntry<E::Handle>, CacheError> {
        let handle = self.engine.compile(text.as_bytes(), case_sensitive)?;
        Ok(OwnedEntry::new(handle))
    }

    fn compile_entry(
        &self,
        key: &PatternKey,
    ) -> Result<Arc<CachedEntry<E::Handle>>, CacheError> {
        self.tracker
            .acquire_pattern(self.config.max_simultaneous_compiled_patterns)?;

        let started = Instant::now();
        let compiled = self.engine.compile(key.text.as_bytes(), key.case_sensitive);
        self.config
            .metrics
            .record_timer(names::PATTERNS_COMPILATION_LATENCY, started.elapsed().as_nanos() as u64);

        let handle = match compiled {
            Ok(h) => h,
            Err(e) => {
                self.tracker.release_pattern();
                self.config
                    .metrics
                    .increment_counter(names::ERRORS_COMPILATION_FAILED_TOTAL, 1);
                return Err(e);
            }
        };

        let size = handle.program_size_bytes();
        self.config
            .metrics
            .increment_counter(names::PATTERNS_COMPILED_TOTAL, 1);
        Ok(Arc::new(CachedEntry::with_permit(
            handle,
            key.clone(),
            size,
            Arc::clone(&self.tracker),
        )))
    }

    fn bind_matcher(
        &self,
        entry: Arc<CachedEntry<E::Handle>>,
    ) -> Result<MatcherHandle<E::Handle>, CacheError> {
        match self
            .tracker
            .acquire_matcher(entry.matcher_count_cell(), self.config.max_matchers_per_pattern)
        {
            Ok(()) => {
                let entry_ref = EntryRef::from_already_acquired(entry);
                Ok(MatcherHandle::new(entry_ref, Arc::clone(&self.tracker)))
            }
            Err(e) => {
                // `tracker.acquire_matcher` has already recorded the
                // resource-exhausted metric; this branch only needs to undo
                // the refcount bump the caller made before calling us.
                entry.decrement_refcount();
                Err(e)
            }
        }
    }

    /// Removes `key` from the map with the same disposition logic as
    /// eviction (deferred if referenced, destroyed immediately otherwise)
    /// but without counting toward any of the three eviction-reason totals.
    /// Used by `validate_cached_patterns` invalidation and by `clear()`,
    /// neither of which is an eviction in the LRU/idle sense.
    fn invalidate_key(&self, key: &PatternKey) {
        if let Some((_, entry)) = self.map.remove(key) {
            self.stats.add_native_memory(-(entry.size_bytes as i64));
            if entry.refcount() > 0 {
                self.deferred.push(entry);
            }
        }
    }

    /// Disposes of `entry` per the outcome the spec treats as mutually
    /// exclusive: a referenced entry counts as `evictionsDeferred` *only*
    /// (recorded here, at the moment it is pushed, not again when the
    /// sweep later destroys it); an unreferenced entry counts under its
    /// `reason` (`evictionsLru`/`evictionsIdle`) since it is destroyed
    /// immediately and never touches the deferred queue at all.
    fn evict_key(&self, key: &PatternKey, reason: EvictionReason) {
        if let Some((_, entry)) = self.map.remove(key) {
            self.stats.add_native_memory(-(entry.size_bytes as i64));
            if entry.refcount() > 0 {
                self.stats.record_eviction_deferred();
                self.config
                    .metrics
                    .increment_counter(names::EVICTIONS_DEFERRED_TOTAL, 1);
                self.deferred.push(entry);
            } else {
                match reason {
                    EvictionReason::Lru => {
                        self.stats.record_eviction_lru();
                        self.config.metrics.increment_counter(names::EVICTIONS_LRU_TOTAL, 1);
                    }
                    EvictionReason::Idle => {
                        self.stats.record_eviction_idle();
                        self.config.metrics.increment_counter(names::EVICTIONS_IDLE_TOTAL, 1);
                    }
                }
            }
        }
    }

    /// Removes every entry whose age exceeds `eviction_protection` and
    /// whose idle time exceeds `idle_timeout`.
    fn run_idle_scan(&self) {
        let mut stale = Vec::new();
        for item in self.map.iter() {
            let entry = item.value();
            if entry.age() >= self.config.eviction_protection
                && entry.idle_for() >= self.config.idle_timeout
            {
                stale.push(item.key().clone());
            }
        }
        for key in stale {
            self.evict_key(&key, EvictionReason::Idle);
        }
    }

    /// Sampling-based LRU eviction: if the map exceeds `max_cache_size`,
    /// takes a single reservoir-sampled snapshot of up to `sample_size =
    /// min(500, len())` keys, sorts the sample by descending idle time, and
    /// evicts the oldest `len() - max_cache_size` of them (skipping any
    /// still within `eviction_protection`). One pass per call: a single
    /// call may not fully close the gap if the snapshot's oldest entries
    /// are mostly protected, in which case the next worker tick tries again.
    fn run_lru_eviction(&self) {
        let len = self.map.len();
        if len <= self.config.max_cache_size {
            return;
        }
        let target = len - self.config.max_cache_size;
        let sample_size = len.min(500);

        let mut sample: Vec<(PatternKey, std::time::Duration)> = Vec::with_capacity(sample_size);
        let mut seen = 0usize;
        for item in self.map.iter() {
            let key = item.key().clone();
            let idle = item.value().idle_for();
            seen += 1;
            if sample.len() < sample_size {
                sample.push((key, idle));
            } else {
                let slot = fastrand::usize(0..seen);
                if slot < sample_size {
                    sample[slot] = (key, idle);
                }
            }
        }

        sample.sort_by(|a, b| b.1.cmp(&a.1));

        let mut evicted = 0usize;
        for (key, _) in sample {
            if evicted >= target {
                break;
            }
            if let Some(entry_guard) = self.map.get(&key) {
                if entry_guard.age() < self.config.eviction_protection {
                    continue;
                }
                drop(entry_guard);
                self.evict_key(&key, EvictionReason::Lru);
                evicted += 1;
            }
        }
    }

    /// Registers every gauge once, at construction. Each reader closure
    /// holds only a `Weak` back-reference so the registered gauge does not
    /// keep the cache alive after its last `Arc` is dropped (the registry
    /// living inside `config.metrics` is the only thing that outlives this
    /// call, and it never reaches back into `Self`).
    fn register_gauges(cache: &Arc<Self>) {
        let sink = &cache.config.metrics;

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_PATTERNS_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.map.len() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_NATIVE_MEMORY_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.stats.native_memory_bytes() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_NATIVE_MEMORY_PEAK,
            Arc::new(move || {
                weak.upgrade()
                    .map_or(0.0, |c| c.stats.peak_native_memory_bytes() as f64)
            }),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_DEFERRED_PATTERNS_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.deferred.len() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_DEFERRED_PATTERNS_PEAK,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.deferred.peak_len() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_DEFERRED_NATIVE_MEMORY_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.deferred.bytes() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::CACHE_DEFERRED_NATIVE_MEMORY_PEAK,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.deferred.peak_bytes() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::RESOURCES_PATTERNS_ACTIVE_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.tracker.active_patterns() as f64)),
        );

        let weak = Arc::downgrade(cache);
        sink.register_gauge(
            names::RESOURCES_MATCHERS_ACTIVE_CURRENT,
            Arc::new(move || weak.upgrade().map_or(0.0, |c| c.tracker.active_matchers() as f64)),
        );
    }

    /// Removes every entry from the map. Entries still referenced move to
    /// the deferred queue exactly as they would under normal eviction.
    pub fn clear(&self) {
        let keys: Vec<PatternKey> = self.map.iter().map(|item| item.key().clone()).collect();
        for key in keys {
            self.invalidate_key(&key);
        }
    }

    /// Resets all statistics counters to zero without touching cache
    /// contents.
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// `clear()` followed by `reset_statistics()`.
    pub fn reset(&self) {
        self.clear();
        self.reset_statistics();
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats.snapshot(
            self.map.len(),
            self.config.max_cache_size,
            self.deferred.len(),
        )
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn resource_tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Stops the background worker, if any, and performs one final
    /// deferred-queue drain. Cached entries that are still referenced
    /// remain valid (their `Arc`s are held by outstanding matchers) but
    /// will no longer be swept automatically. Safe to call more than once:
    /// every call after the first is a no-op.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.shutdown();
        }
        self.deferred.sweep();
    }
}
