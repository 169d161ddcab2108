//! The merged background maintenance worker: idle-timeout scanning,
//! deferred-queue sweeping, and sampling-based LRU eviction all run from
//! one thread on their own cadences, driven by a single `crossbeam_channel`
//! ticker plus a shutdown signal.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to the spawned background thread. Dropping this without calling
/// [`Self::shutdown`] leaves the thread running detached — callers that
/// want a clean join should always call `shutdown()` explicitly rather than
/// relying on `Drop` for thread lifecycle.
pub struct EvictionWorker {
    stop: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl EvictionWorker {
    /// Spawns the worker thread. `tick_interval` should be the minimum of
    /// `eviction_scan_interval` and `deferred_cleanup_interval`; `on_tick`
    /// is called on every tick and is expected to internally rate-limit
    /// its idle-scan and deferred-sweep sub-tasks against their own
    /// intervals (the `PatternCache` closure tracks last-run instants).
    ///
    /// Two threads cooperate: a ticker that only ever sends on `tick_tx`,
    /// and the worker loop that calls `on_tick`. Shutdown is a shared
    /// `AtomicBool` the ticker polls (not a second receiver on the same
    /// channel — `crossbeam_channel` delivers each message to exactly one
    /// receiver, so two receivers racing for one `Shutdown` send would
    /// leave whichever thread loses it blocked forever) plus a dedicated
    /// one-shot channel that unblocks the worker loop's `select!` immediately
    /// instead of waiting out the rest of the current tick interval.
    pub fn spawn<F>(tick_interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (tick_tx, tick_rx) = bounded::<()>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let ticker_stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            run_ticker(tick_interval, &tick_tx, &ticker_stop);
        });

        let join_handle = std::thread::spawn(move || {
            run_worker_loop(&tick_rx, &shutdown_rx, &mut on_tick);
        });

        Self {
            stop,
            shutdown_tx,
            join_handle: Some(join_handle),
        }
    }

    /// Signals shutdown and blocks until the worker thread has exited.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_ticker(interval: Duration, tick_tx: &Sender<()>, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(interval);
        if stop.load(Ordering::Acquire) {
            return;
        }
        if tick_tx.send(()).is_err() {
            return;
        }
    }
}

fn run_worker_loop<F: FnMut()>(tick_rx: &Receiver<()>, shutdown_rx: &Receiver<()>, on_tick: &mut F) {
    loop {
        select! {
            recv(shutdown_rx) -> _ => {
                on_tick();
                return;
            }
            recv(tick_rx) -> _ => on_tick(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_accumulate_and_shutdown_runs_a_final_pass() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let worker = EvictionWorker::spawn(Duration::from_millis(10), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(60));
        worker.shutdown();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
