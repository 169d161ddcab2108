//! The metrics sink boundary: a small capability set the cache calls into on
//! every relevant event, with a no-op default and an adapter onto the
//! `metrics` crate's global recorder.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Stable, dot-separated metric names. Hosts may apply their own prefix on
/// top via [`MetricsCrateSink::with_prefix`].
pub mod names {
    pub const PATTERNS_COMPILED_TOTAL: &str = "patterns.compiled.total.count";
    pub const CACHE_HITS_TOTAL: &str = "patterns.cache.hits.total.count";
    pub const CACHE_MISSES_TOTAL: &str = "patterns.cache.misses.total.count";
    pub const MATCHING_OPERATIONS_TOTAL: &str = "matching.operations.total.count";
    pub const MATCHING_BULK_OPERATIONS_TOTAL: &str = "matching.bulk.operations.total.count";
    pub const MATCHING_BULK_ITEMS_TOTAL: &str = "matching.bulk.items.total.count";
    pub const CAPTURE_OPERATIONS_TOTAL: &str = "capture.operations.total.count";
    pub const CAPTURE_BULK_OPERATIONS_TOTAL: &str = "capture.bulk.operations.total.count";
    pub const CAPTURE_BULK_ITEMS_TOTAL: &str = "capture.bulk.items.total.count";
    pub const CAPTURE_FINDALL_MATCHES_TOTAL: &str = "capture.findall.matches.total.count";
    pub const REPLACE_OPERATIONS_TOTAL: &str = "replace.operations.total.count";
    pub const REPLACE_BULK_OPERATIONS_TOTAL: &str = "replace.bulk.operations.total.count";
    pub const REPLACE_BULK_ITEMS_TOTAL: &str = "replace.bulk.items.total.count";
    pub const EVICTIONS_LRU_TOTAL: &str = "cache.evictions.lru.total.count";
    pub const EVICTIONS_IDLE_TOTAL: &str = "cache.evictions.idle.total.count";
    pub const EVICTIONS_DEFERRED_TOTAL: &str = "cache.evictions.deferred.total.count";
    pub const RESOURCES_PATTERNS_FREED_TOTAL: &str = "resources.patterns.freed.total.count";
    pub const RESOURCES_MATCHERS_FREED_TOTAL: &str = "resources.matchers.freed.total.count";
    pub const ERRORS_COMPILATION_FAILED_TOTAL: &str = "errors.compilation.failed.total.count";
    pub const ERRORS_RESOURCE_EXHAUSTED_TOTAL: &str = "errors.resource.exhausted.total.count";

    pub const PATTERNS_COMPILATION_LATENCY: &str = "patterns.compilation.latency";
    pub const MATCHING_FULL_MATCH_LATENCY: &str = "matching.full_match.latency";
    pub const MATCHING_PARTIAL_MATCH_LATENCY: &str = "matching.partial_match.latency";
    pub const CAPTURE_LATENCY: &str = "capture.latency";
    pub const REPLACE_LATENCY: &str = "replace.latency";

    pub const CACHE_PATTERNS_CURRENT: &str = "cache.patterns.current.count";
    pub const CACHE_NATIVE_MEMORY_CURRENT: &str = "cache.native_memory.current.bytes";
    pub const CACHE_NATIVE_MEMORY_PEAK: &str = "cache.native_memory.peak.bytes";
    pub const CACHE_DEFERRED_PATTERNS_CURRENT: &str = "cache.deferred.patterns.current.count";
    pub const CACHE_DEFERRED_PATTERNS_PEAK: &str = "cache.deferred.patterns.peak.count";
    pub const CACHE_DEFERRED_NATIVE_MEMORY_CURRENT: &str =
        "cache.deferred.native_memory.current.bytes";
    pub const CACHE_DEFERRED_NATIVE_MEMORY_PEAK: &str = "cache.deferred.native_memory.peak.bytes";
    pub const RESOURCES_PATTERNS_ACTIVE_CURRENT: &str = "resources.patterns.active.current.count";
    pub const RESOURCES_MATCHERS_ACTIVE_CURRENT: &str = "resources.matchers.active.current.count";
}

/// A gauge reader: called on demand by the adapter, not polled by the cache.
pub type GaugeFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// The capability set the pattern cache emits events through.
///
/// Expressed as a trait (not an enum of backends) so a host can plug in its
/// own recorder without this crate knowing about it; see [`NoopSink`] and
/// [`MetricsCrateSink`] for the two shipped implementations.
pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &'static str, delta: u64);
    fn record_timer(&self, name: &'static str, nanos: u64);
    fn register_gauge(&self, name: &'static str, read: GaugeFn);
}

/// Every operation is an inlined no-op. This is the default sink so the hot
/// path never has to branch on whether metrics are enabled — it always
/// makes the same virtual call, which the optimizer can often devirtualize
/// when `NoopSink` is the concrete type behind a generic, and which costs a
/// single predictable indirect call when it is behind `Arc<dyn MetricsSink>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    #[inline]
    fn increment_counter(&self, _name: &'static str, _delta: u64) {}
    #[inline]
    fn record_timer(&self, _name: &'static str, _nanos: u64) {}
    #[inline]
    fn register_gauge(&self, _name: &'static str, _read: GaugeFn) {}
}

/// Default cadence at which registered gauges are re-read and pushed into
/// the `metrics` crate's recorder. Matches the order of magnitude of
/// `eviction_scan_interval`'s own default — gauges this crate reports
/// (queue depths, native-memory totals) don't need sub-second freshness.
const DEFAULT_GAUGE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delegates to the `metrics` crate's globally installed recorder, applying
/// a configurable prefix to every metric name.
///
/// This is the "external-registry adapter" variant: the host installs its
/// own `metrics::Recorder` (Prometheus, StatsD, whatever) once at startup,
/// and every cache instance using `MetricsCrateSink` reports into it.
///
/// `register_gauge` callbacks are not self-polling (the `metrics` crate has
/// no "pull" gauge type), so this sink keeps its own registry of
/// `(name, read)` pairs and lazily spawns one background thread, on first
/// registration, that re-reads and re-publishes every registered gauge on
/// `poll_interval` — the same ticker-thread shape `EvictionWorker` uses for
/// its own periodic work.
pub struct MetricsCrateSink {
    prefix: Option<&'static str>,
    poll_interval: Duration,
    gauges: Arc<Mutex<Vec<(String, GaugeFn)>>>,
    poller_started: AtomicBool,
    stop: Arc<AtomicBool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsCrateSink {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_GAUGE_POLL_INTERVAL)
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        let mut sink = Self::new();
        sink.prefix = Some(prefix);
        sink
    }

    /// Builds a sink whose gauge-polling thread wakes on `interval` instead
    /// of the default. Useful for tests that want to observe a gauge update
    /// without sleeping a full second.
    pub fn with_poll_interval(interval: Duration) -> Self {
        Self {
            prefix: None,
            poll_interval: interval,
            gauges: Arc::new(Mutex::new(Vec::new())),
            poller_started: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            poller: Mutex::new(None),
        }
    }

    fn qualify(&self, name: &'static str) -> String {
        match self.prefix {
            Some(p) => format!("{p}.{name}"),
            None => name.to_string(),
        }
    }

    fn ensure_poller_started(&self) {
        if self
            .poller_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let gauges = Arc::clone(&self.gauges);
        let stop = Arc::clone(&self.stop);
        let interval = self.poll_interval;
        let handle = std::thread::spawn(move || loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            std::thread::sleep(interval);
            if stop.load(Ordering::Acquire) {
                return;
            }
            for (name, read) in gauges.lock().iter() {
                metrics::gauge!(name.clone()).set(read());
            }
        });
        *self.poller.lock() = Some(handle);
    }
}

impl Default for MetricsCrateSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals the polling thread to stop on drop. Mirrors `EvictionWorker`'s
/// ticker: the thread is left detached rather than joined, since it can be
/// mid-`sleep` for up to `poll_interval` and a `Drop` impl should not block.
impl Drop for MetricsCrateSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.poller.lock().take();
    }
}

impl MetricsSink for MetricsCrateSink {
    fn increment_counter(&self, name: &'static str, delta: u64) {
        metrics::counter!(self.qualify(name)).increment(delta);
    }

    fn record_timer(&self, name: &'static str, nanos: u64) {
        metrics::histogram!(self.qualify(name)).record(nanos as f64);
    }

    fn register_gauge(&self, name: &'static str, read: GaugeFn) {
        let qualified = self.qualify(name);
        metrics::gauge!(qualified.clone()).set(read());
        self.gauges.lock().push((qualified, read));
        self.ensure_poller_started();
    }
}
