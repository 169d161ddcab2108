//! # re2-pattern-cache
//!
//! A thread-safe cache of compiled regular-expression programs: refcounted
//! lifetimes, dual LRU/idle eviction, a deferred-cleanup queue for patterns
//! still in use when evicted, and hard resource limits.
//!
//! ## Quick start
//!
//! ```rust
//! use re2_pattern_cache::compile;
//!
//! let pattern = compile(r"\d+").unwrap();
//! assert!(pattern.matches(b"there are 42 apples"));
//! ```
//!
//! Repeated calls to [`compile`] with the same pattern text and
//! case-sensitivity reuse the same compiled program from a process-global
//! cache; [`cache_statistics`] reports the resulting hit rate.
//!
//! ## Disabling the cache
//!
//! Hosts that want every call to compile fresh (no sharing, no eviction,
//! no resource tracking) can install a cache built with
//! `CacheConfigBuilder::cache_enabled(false)` via [`set_global_cache`], or
//! bypass the cache entirely via [`compile_without_cache`].

mod pattern;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use re2_pattern_cache_core::{CacheConfig, CacheError, CacheStatistics, PatternCache, Re2LikeEngine};
use std::sync::Arc;

pub use pattern::{CaptureGroup, MatchResult, Matcher, Pattern};
pub use re2_pattern_cache_core::{CacheConfigBuilder, MetricsCrateSink, MetricsSink, NoopSink, ResourceKind};

type SharedCache = Arc<PatternCache<Re2LikeEngine>>;

static GLOBAL_CACHE: Lazy<RwLock<SharedCache>> =
    Lazy::new(|| RwLock::new(PatternCache::new(Re2LikeEngine, CacheConfig::default())));

/// Swaps the process-global cache for `cache`, shutting down the previous
/// one's background worker first.
///
/// Intended for hosts that need a non-default [`CacheConfig`] and for tests
/// that need isolation from one another's cache state (see the `serial_test`
/// dev-dependency: tests that call this must be run serially).
pub fn set_global_cache(cache: SharedCache) {
    let previous = {
        let mut guard = GLOBAL_CACHE.write();
        std::mem::replace(&mut *guard, cache)
    };
    previous.shutdown();
}

fn global_cache() -> SharedCache {
    Arc::clone(&GLOBAL_CACHE.read())
}

/// Compiles (or reuses) a case-sensitive pattern via the process-global cache.
pub fn compile(text: &str) -> Result<Pattern, CacheError> {
    let cache = global_cache();
    let matcher = cache.get_or_compile(text, true)?;
    Ok(Pattern::new(matcher, Arc::clone(&cache.config().metrics)))
}

/// Compiles (or reuses) a case-insensitive pattern via the process-global
/// cache. Case-sensitive and case-insensitive compiles of the same text are
/// distinct cache entries.
pub fn compile_case_insensitive(text: &str) -> Result<Pattern, CacheError> {
    let cache = global_cache();
    let matcher = cache.get_or_compile(text, false)?;
    Ok(Pattern::new(matcher, Arc::clone(&cache.config().metrics)))
}

/// Compiles `text` without consulting or populating the cache. The returned
/// handle is not refcounted, not subject to eviction, and not visible to
/// [`cache_statistics`].
pub fn compile_without_cache(
    text: &str,
    case_sensitive: bool,
) -> Result<re2_pattern_cache_core::OwnedEntry<re2_pattern_cache_core::Re2LikeHandle>, CacheError>
{
    global_cache().compile_without_cache(text, case_sensitive)
}

/// Evicts every entry from the global cache. Entries still referenced by a
/// live [`Pattern`] move to the deferred-cleanup queue instead of being
/// destroyed immediately.
pub fn clear_cache() {
    global_cache().clear();
}

/// Clears the global cache and zeroes every statistics counter, including
/// the native-memory peak. Primarily useful for test isolation.
pub fn reset_cache() {
    global_cache().reset();
}

/// A point-in-time snapshot of the global cache's statistics.
pub fn cache_statistics() -> CacheStatistics {
    global_cache().statistics()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn compile_and_match_round_trip() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        let pattern = compile(r"\d+").unwrap();
        assert!(pattern.matches(b"there are 42 apples"));
        assert!(!pattern.matches(b"no digits here"));
    }

    #[test]
    #[serial]
    fn repeated_compiles_of_the_same_text_are_cache_hits() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        let _p1 = compile("abc").unwrap();
        let _p2 = compile("abc").unwrap();
        let stats = cache_statistics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    #[serial]
    fn case_sensitive_and_insensitive_are_distinct_entries() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        let sensitive = compile("abc").unwrap();
        let insensitive = compile_case_insensitive("abc").unwrap();
        assert!(!sensitive.full_match(b"ABC"));
        assert!(insensitive.full_match(b"ABC"));
        assert_eq!(cache_statistics().current_size, 2);
    }

    #[test]
    #[serial]
    fn clear_cache_resets_current_size() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        {
            let _p = compile("abc").unwrap();
        }
        assert_eq!(cache_statistics().current_size, 1);
        clear_cache();
        assert_eq!(cache_statistics().current_size, 0);
    }

    #[test]
    #[serial]
    fn replace_all_substitutes_every_match() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        let pattern = compile(r"\d+").unwrap();
        let out = pattern.replace_all(b"a1b22c333", b"#").unwrap();
        assert_eq!(out, b"a#b#c#");
    }

    #[test]
    #[serial]
    fn match_all_preserves_order() {
        set_global_cache(PatternCache::new(Re2LikeEngine, CacheConfig::default()));
        let pattern = compile(r"^a").unwrap();
        let inputs: Vec<&[u8]> = vec![b"apple", b"banana", b"avocado"];
        assert_eq!(pattern.match_all(&inputs), vec![true, false, true]);
    }
}
