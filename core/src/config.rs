use crate::error::CacheError;
use crate::metrics::{MetricsSink, NoopSink};
use std::sync::Arc;
use std::time::Duration;

/// Validated configuration for a [`crate::cache::PatternCache`].
///
/// Always constructed through [`CacheConfigBuilder`], which performs
/// cross-field validation at `build()` time rather than scattering checks
/// across the cache's hot paths.
#[derive(Clone)]
pub struct CacheConfig {
    pub cache_enabled: bool,
    pub max_cache_size: usize,
    pub idle_timeout: Duration,
    pub eviction_scan_interval: Duration,
    pub deferred_cleanup_interval: Duration,
    pub max_simultaneous_compiled_patterns: usize,
    pub max_matchers_per_pattern: usize,
    pub eviction_protection: Duration,
    pub validate_cached_patterns: bool,
    pub metrics: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("cache_enabled", &self.cache_enabled)
            .field("max_cache_size", &self.max_cache_size)
            .field("idle_timeout", &self.idle_timeout)
            .field("eviction_scan_interval", &self.eviction_scan_interval)
            .field("deferred_cleanup_interval", &self.deferred_cleanup_interval)
            .field(
                "max_simultaneous_compiled_patterns",
                &self.max_simultaneous_compiled_patterns,
            )
            .field("max_matchers_per_pattern", &self.max_matchers_per_pattern)
            .field("eviction_protection", &self.eviction_protection)
            .field("validate_cached_patterns", &self.validate_cached_patterns)
            .finish_non_exhaustive()
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfigBuilder::default()
            .build()
            .expect("default configuration is always valid")
    }
}

/// Builder for [`CacheConfig`]. Every field has a sensible production-scale
/// default so tests and callers only need to override what they care about.
pub struct CacheConfigBuilder {
    cache_enabled: bool,
    max_cache_size: usize,
    idle_timeout: Duration,
    eviction_scan_interval: Duration,
    deferred_cleanup_interval: Duration,
    max_simultaneous_compiled_patterns: usize,
    max_matchers_per_pattern: usize,
    eviction_protection: Duration,
    validate_cached_patterns: bool,
    metrics: Arc<dyn MetricsSink>,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_cache_size: 10_000,
            idle_timeout: Duration::from_secs(600),
            eviction_scan_interval: Duration::from_secs(60),
            deferred_cleanup_interval: Duration::from_secs(5),
            max_simultaneous_compiled_patterns: 50_000,
            max_matchers_per_pattern: 10_000,
            eviction_protection: Duration::from_millis(1_000),
            validate_cached_patterns: false,
            metrics: Arc::new(NoopSink),
        }
    }
}

impl CacheConfigBuilder {
    pub fn cache_enabled(mut self, v: bool) -> Self {
        self.cache_enabled = v;
        self
    }

    pub fn max_cache_size(mut self, v: usize) -> Self {
        self.max_cache_size = v;
        self
    }

    pub fn idle_timeout(mut self, v: Duration) -> Self {
        self.idle_timeout = v;
        self
    }

    pub fn eviction_scan_interval(mut self, v: Duration) -> Self {
        self.eviction_scan_interval = v;
        self
    }

    pub fn deferred_cleanup_interval(mut self, v: Duration) -> Self {
        self.deferred_cleanup_interval = v;
        self
    }

    pub fn max_simultaneous_compiled_patterns(mut self, v: usize) -> Self {
        self.max_simultaneous_compiled_patterns = v;
        self
    }

    pub fn max_matchers_per_pattern(mut self, v: usize) -> Self {
        self.max_matchers_per_pattern = v;
        self
    }

    pub fn eviction_protection(mut self, v: Duration) -> Self {
        self.eviction_protection = v;
        self
    }

    pub fn validate_cached_patterns(mut self, v: bool) -> Self {
        self.validate_cached_patterns = v;
        self
    }

    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// Validates the accumulated configuration and produces a [`CacheConfig`].
    ///
    /// Rejects `max_cache_size > max_simultaneous_compiled_patterns` (the
    /// map could never actually reach a size the pattern limit would allow
    /// it to hold), and rejects scan-interval orderings that would make the
    /// deferred sweep run less often than the full idle scan, or the idle
    /// scan run less often than the timeout it is meant to enforce.
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        if self.max_cache_size > self.max_simultaneous_compiled_patterns {
            return Err(CacheError::InvalidState {
                reason: "max_cache_size must not exceed max_simultaneous_compiled_patterns",
            });
        }
        if self.deferred_cleanup_interval > self.eviction_scan_interval {
            return Err(CacheError::InvalidState {
                reason: "deferred_cleanup_interval must not exceed eviction_scan_interval",
            });
        }
        if self.eviction_scan_interval > self.idle_timeout {
            return Err(CacheError::InvalidState {
                reason: "eviction_scan_interval must not exceed idle_timeout",
            });
        }
        Ok(CacheConfig {
            cache_enabled: self.cache_enabled,
            max_cache_size: self.max_cache_size,
            idle_timeout: self.idle_timeout,
            eviction_scan_interval: self.eviction_scan_interval,
            deferred_cleanup_interval: self.deferred_cleanup_interval,
            max_simultaneous_compiled_patterns: self.max_simultaneous_compiled_patterns,
            max_matchers_per_pattern: self.max_matchers_per_pattern,
            eviction_protection: self.eviction_protection,
            validate_cached_patterns: self.validate_cached_patterns,
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = CacheConfig::default();
        assert!(cfg.cache_enabled);
        assert_eq!(cfg.max_cache_size, 10_000);
    }

    #[test]
    fn rejects_max_cache_size_above_pattern_limit() {
        let err = CacheConfig::builder()
            .max_cache_size(100)
            .max_simultaneous_compiled_patterns(10)
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidState { .. }));
    }

    #[test]
    fn rejects_deferred_interval_above_scan_interval() {
        let err = CacheConfig::builder()
            .deferred_cleanup_interval(Duration::from_secs(100))
            .eviction_scan_interval(Duration::from_secs(10))
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidState { .. }));
    }

    #[test]
    fn rejects_scan_interval_above_idle_timeout() {
        let err = CacheConfig::builder()
            .eviction_scan_interval(Duration::from_secs(1000))
            .idle_timeout(Duration::from_secs(10))
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidState { .. }));
    }

    #[test]
    fn equal_scan_interval_and_idle_timeout_is_allowed() {
        let cfg = CacheConfig::builder()
            .eviction_scan_interval(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(cfg.eviction_scan_interval, cfg.idle_timeout);
    }
}
