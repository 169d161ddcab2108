//! RAII wrappers tying a borrowed/owned engine handle to the resource
//! tracker and the entry's refcount.

use crate::engine::EngineHandle;
use crate::entry::CachedEntry;
use crate::resource_tracker::ResourceTracker;
use std::sync::Arc;

/// A live reference to a cached, shared entry.
///
/// Dropping an `EntryRef` decrements the entry's refcount. While any
/// `EntryRef` exists, [`DeferredQueue::sweep`](crate::deferred_queue::DeferredQueue::sweep)
/// will not release the underlying entry even after it has been evicted
/// from the map.
pub struct EntryRef<H: EngineHandle> {
    entry: Arc<CachedEntry<H>>,
}

impl<H: EngineHandle> EntryRef<H> {
    /// Wraps `entry`, whose refcount the caller has *already* incremented
    /// while holding the map guard that proved it reachable. This
    /// constructor intentionally does not increment the refcount itself:
    /// the increment must happen before the guard is released (see
    /// `PatternCache::get_or_compile`), and this type only owns the
    /// matching decrement.
    pub(crate) fn from_already_acquired(entry: Arc<CachedEntry<H>>) -> Self {
        Self { entry }
    }

    pub fn handle(&self) -> &H {
        &self.entry.handle
    }

    pub fn program_size_bytes(&self) -> usize {
        self.entry.size_bytes
    }

    pub(crate) fn entry_arc(&self) -> &Arc<CachedEntry<H>> {
        &self.entry
    }
}

impl<H: EngineHandle> Drop for EntryRef<H> {
    fn drop(&mut self) {
        self.entry.decrement_refcount();
    }
}

/// A matcher bound to a cached pattern, additionally subject to the
/// per-entry `max_matchers_per_pattern` ceiling.
///
/// Closing a matcher (dropping this value) releases both the entry
/// reference and the matcher-slot accounting; `close()` is exposed
/// explicitly as a consuming method so that using a matcher after close is
/// a compile error rather than a runtime `InvalidState`.
pub struct MatcherHandle<H: EngineHandle> {
    entry_ref: EntryRef<H>,
    tracker: Arc<ResourceTracker>,
}

impl<H: EngineHandle> MatcherHandle<H> {
    /// Wraps `entry_ref`, whose entry has *already* had a matcher slot
    /// acquired via `tracker.acquire_matcher(entry.matcher_count_cell(), ..)`.
    pub(crate) fn new(entry_ref: EntryRef<H>, tracker: Arc<ResourceTracker>) -> Self {
        Self { entry_ref, tracker }
    }

    pub fn handle(&self) -> &H {
        self.entry_ref.handle()
    }

    /// Explicit close, consuming `self`. Equivalent to dropping the value,
    /// but gives callers a named `destroy()`-style lifecycle call.
    pub fn close(self) {
        drop(self)
    }
}

impl<H: EngineHandle> Drop for MatcherHandle<H> {
    fn drop(&mut self) {
        self.tracker
            .release_matcher(self.entry_ref.entry_arc().matcher_count_cell());
    }
}

/// An engine handle compiled outside the cache entirely (the bypass path:
/// `cache_enabled == false` when accessed via `compile_without_cache`).
///
/// Never map-tracked, never refcounted, never visible to eviction. Exists
/// purely so callers get the same `Engine`-produced handle type regardless
/// of whether caching is active.
pub struct OwnedEntry<H: EngineHandle> {
    handle: H,
}

impl<H: EngineHandle> OwnedEntry<H> {
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::entry::PatternKey;
    use crate::re2_engine::Re2LikeEngine;

    fn make_entry() -> Arc<CachedEntry<crate::re2_engine::Re2LikeHandle>> {
        let handle = Re2LikeEngine.compile(b"abc", true).unwrap();
        Arc::new(CachedEntry::new(handle, PatternKey::new("abc", true), 32))
    }

    #[test]
    fn dropping_entry_ref_decrements_refcount() {
        let entry = make_entry();
        entry.increment_refcount();
        {
            let _r = EntryRef::from_already_acquired(Arc::clone(&entry));
            assert_eq!(entry.refcount(), 1);
        }
        assert_eq!(entry.refcount(), 0);
    }

    #[test]
    fn dropping_matcher_handle_releases_tracker_slot() {
        let entry = make_entry();
        entry.increment_refcount();
        let tracker = Arc::new(ResourceTracker::default());
        tracker
            .acquire_matcher(entry.matcher_count_cell(), 10)
            .unwrap();
        {
            let entry_ref = EntryRef::from_already_acquired(Arc::clone(&entry));
            let matcher = MatcherHandle::new(entry_ref, Arc::clone(&tracker));
            assert_eq!(tracker.active_matchers(), 1);
            matcher.close();
        }
        assert_eq!(tracker.active_matchers(), 0);
        assert_eq!(entry.refcount(), 0);
    }

    #[test]
    fn owned_entry_bypasses_tracking() {
        let handle = Re2LikeEngine.compile(b"xyz", true).unwrap();
        let owned = OwnedEntry::new(handle);
        assert!(owned.handle().full_match(b"xyz"));
    }
}
