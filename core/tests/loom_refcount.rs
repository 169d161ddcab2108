//! Loom model test for invariant 1 ("no caller ever observes a destroyed
//! handle"): the hit-path rule that refcount must be incremented while the
//! map guard that proved reachability is still held.
//!
//! `DashMap`/`crossbeam_channel`/`parking_lot` are not loom-instrumented, so
//! this does not drive `PatternCache` itself through loom's scheduler.
//! Instead it models the two-step protocol `PatternCache::get_or_compile`'s
//! hit path follows — read guard, increment refcount, touch, drop guard —
//! against a loom `Mutex`-guarded slot standing in for one `DashMap` shard,
//! racing a second thread that evicts-and-destroys once the refcount looks
//! free. This is a bounded substitute for a sanitizer run across the real
//! concurrent map, exercising the same publication-order reasoning this
//! crate's hit path depends on.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --release --test loom_refcount`

#![cfg(loom)]

use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use loom::sync::{Arc, Mutex};
use loom::thread;

struct Entry {
    refcount: AtomicUsize,
    destroyed: AtomicBool,
}

/// One shard: either holds a live entry or is empty (post-eviction).
type Shard = Mutex<Option<Arc<Entry>>>;

/// Correct hit path: increment the refcount *while* the guard proving
/// reachability is still held, matching `PatternCache::get_or_compile`.
fn correct_hit(shard: &Shard) -> bool {
    let guard = shard.lock().unwrap();
    match &*guard {
        Some(entry) => {
            entry.refcount.fetch_add(1, Ordering::AcqRel);
            drop(guard);
            true
        }
        None => false,
    }
}

/// The evictor: takes the entry out of the shard, and destroys it
/// immediately only if the refcount was already zero at the moment of
/// removal (mirroring `PatternCache::evict_key`'s `refcount() > 0` check,
/// simplified to a single-shot eviction instead of a deferred-queue retry).
fn evict(shard: &Shard) {
    let taken = shard.lock().unwrap().take();
    if let Some(entry) = taken {
        if entry.refcount.load(Ordering::Acquire) == 0 {
            entry.destroyed.store(true, Ordering::Release);
        }
    }
}

fn release(entry: &Arc<Entry>) {
    entry.refcount.fetch_sub(1, Ordering::AcqRel);
}

#[test]
fn correct_protocol_never_observes_a_destroyed_entry_mid_use() {
    loom::model(|| {
        let entry = Arc::new(Entry {
            refcount: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
        });
        let shard: Arc<Shard> = Arc::new(Mutex::new(Some(Arc::clone(&entry))));

        let caller_shard = Arc::clone(&shard);
        let caller_entry = Arc::clone(&entry);
        let caller = thread::spawn(move || {
            if correct_hit(&caller_shard) {
                // Between acquiring the reference and releasing it, the
                // entry must never be marked destroyed: the refcount we
                // hold is exactly what prevents the evictor from doing so.
                assert!(!caller_entry.destroyed.load(Ordering::Acquire));
                release(&caller_entry);
            }
        });

        let evictor_shard = Arc::clone(&shard);
        let evictor = thread::spawn(move || {
            evict(&evictor_shard);
        });

        caller.join().unwrap();
        evictor.join().unwrap();
    });
}
