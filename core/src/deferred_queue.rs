//! The deferred-cleanup queue: entries evicted while still referenced wait
//! here until their refcount drops to zero.

use crate::engine::EngineHandle;
use crate::entry::CachedEntry;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Holds entries that were excised from the cache map but are still
/// reachable through an outstanding [`crate::matcher::EntryRef`].
///
/// Backed by an unbounded `crossbeam_channel` for the push/sweep traffic —
/// a lock-free MPSC channel, since deferred entries are pushed from
/// whichever thread evicts them and swept only from the background worker —
/// plus a `Mutex<Vec<_>>` holding the entries a sweep pass could not yet
/// release, so they are not lost if the channel is drained faster than
/// refcounts reach zero.
pub struct DeferredQueue<H: EngineHandle> {
    sender: Sender<Arc<CachedEntry<H>>>,
    receiver: Receiver<Arc<CachedEntry<H>>>,
    pending: Mutex<Vec<Arc<CachedEntry<H>>>>,
    current_len: AtomicUsize,
    current_bytes: AtomicU64,
    peak_len: AtomicUsize,
    peak_bytes: AtomicU64,
}

impl<H: EngineHandle> DeferredQueue<H> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            pending: Mutex::new(Vec::new()),
            current_len: AtomicUsize::new(0),
            current_bytes: AtomicU64::new(0),
            peak_len: AtomicUsize::new(0),
            peak_bytes: AtomicU64::new(0),
        }
    }

    /// Marks `entry` deferred and enqueues it. Idempotent at the caller
    /// level: the cache only ever calls this once per entry, right after
    /// removing it from the map.
    pub fn push(&self, entry: Arc<CachedEntry<H>>) {
        entry.mark_deferred();
        self.current_len.fetch_add(1, Ordering::AcqRel);
        self.current_bytes
            .fetch_add(entry.size_bytes as u64, Ordering::AcqRel);
        self.bump_peaks();
        self.sender
            .send(entry)
            .expect("receiver is held by self and never dropped before sender");
    }

    fn bump_peaks(&self) {
        let len = self.current_len.load(Ordering::Acquire);
        let mut peak = self.peak_len.load(Ordering::Acquire);
        while len > peak {
            match self
                .peak_len
                .compare_exchange_weak(peak, len, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
        let bytes = self.current_bytes.load(Ordering::Acquire);
        let mut peak_bytes = self.peak_bytes.load(Ordering::Acquire);
        while bytes > peak_bytes {
            match self.peak_bytes.compare_exchange_weak(
                peak_bytes,
                bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => peak_bytes = observed,
            }
        }
    }

    /// Drains newly-pushed entries into `pending`, then retains only those
    /// whose refcount is still nonzero. Returns the number actually freed.
    ///
    /// Called by the background worker on `deferred_cleanup_interval`, and
    /// also opportunistically from `shutdown()` to drain what it can before
    /// the cache goes away.
    pub fn sweep(&self) -> usize {
        let mut pending = self.pending.lock();
        while let Ok(entry) = self.receiver.try_recv() {
            pending.push(entry);
        }

        let before = pending.len();
        let mut freed_bytes = 0u64;
        pending.retain(|entry| {
            let alive = entry.refcount() > 0;
            if !alive {
                freed_bytes += entry.size_bytes as u64;
            }
            alive
        });
        let freed = before - pending.len();

        if freed > 0 {
            self.current_len.fetch_sub(freed, Ordering::AcqRel);
            self.current_bytes.fetch_sub(freed_bytes, Ordering::AcqRel);
        }
        freed
    }

    pub fn len(&self) -> usize {
        self.current_len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::Acquire)
    }

    pub fn peak_len(&self) -> usize {
        self.peak_len.load(Ordering::Acquire)
    }

    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes.load(Ordering::Acquire)
    }
}

impl<H: EngineHandle> Default for DeferredQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}
