//! Core subsystem for `re2-pattern-cache`: a thread-safe cache of compiled
//! regular-expression programs with refcounted lifetimes, dual LRU/idle
//! eviction, a deferred-cleanup queue, and hard resource limits.
//!
//! ## Module organization
//!
//! - [`error`] — the crate's error type and resource-kind enum
//! - [`engine`] — the `Engine`/`EngineHandle` abstraction the cache is generic over
//! - [`re2_engine`] — the default `regex-automata`-backed engine adapter
//! - [`metrics`] — the metrics sink trait, stable metric names, and two sinks
//! - [`config`] — validated cache configuration
//! - [`resource_tracker`] — process-wide and per-entry resource accounting
//! - [`entry`] — the cached entry type and its lifecycle state
//! - [`deferred_queue`] — the queue holding evicted-but-still-referenced entries
//! - [`matcher`] — RAII handles binding callers to cached entries
//! - [`stats`] — atomic counters and the immutable statistics snapshot
//! - [`worker`] — the background maintenance thread
//! - [`cache`] — `PatternCache`, tying every other module together

pub mod cache;
pub mod config;
pub mod deferred_queue;
pub mod engine;
pub mod entry;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod re2_engine;
pub mod resource_tracker;
pub mod stats;
pub mod worker;

pub use cache::PatternCache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use deferred_queue::DeferredQueue;
pub use engine::{CaptureGroup, Engine, EngineHandle};
pub use entry::{CachedEntry, EntryState, PatternKey};
pub use error::{CacheError, ResourceKind};
pub use matcher::{EntryRef, MatcherHandle, OwnedEntry};
pub use metrics::{names as metric_names, GaugeFn, MetricsCrateSink, MetricsSink, NoopSink};
pub use re2_engine::{Re2LikeEngine, Re2LikeHandle};
pub use resource_tracker::ResourceTracker;
pub use stats::{CacheStatistics, StatsCounters};
