use crate::engine::EngineHandle;
use crate::resource_tracker::ResourceTracker;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Ties a successful `ResourceTracker::acquire_pattern` to the lifetime of
/// the `Arc<CachedEntry>` that consumed it, regardless of whether that
/// entry ever enters the cache map, sits in the deferred queue, or is a
/// bypass-path compile: the pattern-resource slot is released exactly once,
/// when the last owner of the entry's `Arc` drops it.
struct PatternPermit {
    tracker: Arc<ResourceTracker>,
}

impl Drop for PatternPermit {
    fn drop(&mut self) {
        self.tracker.release_pattern();
    }
}

/// `(text, case-sensitive)` — the cache's lookup key.
///
/// Two keys with identical text but different case-sensitivity are distinct:
/// this is why the type carries both fields instead of folding
/// case-sensitivity into the text (e.g. by lower-casing it).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub text: String,
    pub case_sensitive: bool,
}

impl PatternKey {
    pub fn new(text: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            text: text.into(),
            case_sensitive,
        }
    }
}

/// Whether an entry is reachable from the cache map or has already been
/// excised and is waiting in the deferred queue.
///
/// A separate flag, read under the same `DashMap` shard guard as the
/// refcount, rather than folding map membership into the refcount itself.
/// See DESIGN.md for the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Live,
    Deferred,
}

/// A `(handle, last-access-time, size, reference-count)` tuple: the basic
/// unit of caching.
///
/// `last_access_millis` stores an offset from the entry's own creation
/// instant rather than an absolute `Instant`, because `Instant` has no
/// stable bit representation to store in an `AtomicU64`. Monotonicity is
/// preserved: readers only ever move this value forward (see
/// [`Self::touch`]).
pub struct CachedEntry<H: EngineHandle> {
    pub handle: H,
    pub key: PatternKey,
    pub size_bytes: usize,
    created_at: Instant,
    last_access_millis: AtomicU64,
    refcount: AtomicUsize,
    matcher_count: AtomicUsize,
    state: AtomicUsize, // EntryState encoded as 0 = Live, 1 = Deferred
    _permit: Option<PatternPermit>,
}

impl<H: EngineHandle> CachedEntry<H> {
    pub fn new(handle: H, key: PatternKey, size_bytes: usize) -> Self {
        Self {
            handle,
            key,
            size_bytes,
            created_at: Instant::now(),
            last_access_millis: AtomicU64::new(0),
            refcount: AtomicUsize::new(0),
            matcher_count: AtomicUsize::new(0),
            state: AtomicUsize::new(0),
            _permit: None,
        }
    }

    /// Same as [`Self::new`], but ties `tracker`'s pattern-resource slot to
    /// this entry's `Arc` lifetime; see [`PatternPermit`].
    pub fn with_permit(
        handle: H,
        key: PatternKey,
        size_bytes: usize,
        tracker: Arc<ResourceTracker>,
    ) -> Self {
        let mut entry = Self::new(handle, key, size_bytes);
        entry._permit = Some(PatternPermit { tracker });
        entry
    }

    /// Age since insertion, used by `eviction_protection`.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Time since this entry was last touched by a hit.
    pub fn idle_for(&self) -> std::time::Duration {
        let last = self.last_access_millis.load(Ordering::Acquire);
        let elapsed_ms = self.created_at.elapsed().as_millis() as u64;
        std::time::Duration::from_millis(elapsed_ms.saturating_sub(last))
    }

    /// Advances `last_access_millis` to "now". Monotonic: a racing older
    /// write can never move it backward because both writers compute the
    /// offset from the same `created_at` and a later call always observes
    /// a `>=` elapsed value; we additionally CAS-max to be robust to
    /// reordering across threads reading `created_at.elapsed()` at
    /// slightly different instants.
    pub fn touch(&self) {
        let now_ms = self.created_at.elapsed().as_millis() as u64;
        let mut current = self.last_access_millis.load(Ordering::Acquire);
        while now_ms > current {
            match self.last_access_millis.compare_exchange_weak(
                current,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// Increments the refcount. Must be called while the caller still holds
    /// whatever guard proved the entry was reachable (the `DashMap` shard
    /// read guard on the hit path) — see `PatternCache::get_or_compile`.
    pub fn increment_refcount(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the refcount. Clamps at zero and logs on underflow: a
    /// negative refcount is a defect (double-release), but per the crate's
    /// error-handling design this must not panic or propagate.
    pub fn decrement_refcount(&self) {
        let prev = self.refcount.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            if v == 0 {
                None
            } else {
                Some(v - 1)
            }
        });
        if prev.is_err() {
            log::error!(
                target: "re2_pattern_cache",
                "refcount underflow on entry {:?}; clamping to zero",
                self.key
            );
        }
    }

    pub fn matcher_count_cell(&self) -> &AtomicUsize {
        &self.matcher_count
    }

    pub fn state(&self) -> EntryState {
        match self.state.load(Ordering::Acquire) {
            0 => EntryState::Live,
            _ => EntryState::Deferred,
        }
    }

    pub fn mark_deferred(&self) {
        self.state.store(1, Ordering::Release);
    }
}
