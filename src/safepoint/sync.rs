//! Pause-pending flag and stop-the-world rendezvous.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::stats::SafepointStats;
use crate::config::SyncConfig;
use crate::thread::{ThreadContext, ThreadRegistry, ThreadState, current_thread_id};

// =============================================================================
// SafepointSync
// =============================================================================

/// State shared between the requester and joiners, guarded by the
/// rendezvous mutex. The atomic mirror exists only for the lock-free
/// fast path in `join_if_pending`.
struct Rendezvous {
    pending: bool,
}

/// Coordinator for global pauses.
///
/// Owns the process-wide pause-pending flag. Threads never mutate it; they
/// read it at the two checkpoint sites (before blocking and after waking)
/// and call [`join_if_pending`](SafepointSync::join_if_pending) to
/// acknowledge a pause.
pub struct SafepointSync {
    registry: Arc<ThreadRegistry>,
    config: SyncConfig,

    /// Lock-free mirror of `Rendezvous::pending` for checkpoint fast paths.
    pending: AtomicBool,

    rendezvous: Mutex<Rendezvous>,
    resumed: Condvar,

    stats: SafepointStats,
}

impl SafepointSync {
    /// Create a rendezvous over the given thread registry.
    pub fn new(registry: Arc<ThreadRegistry>, config: SyncConfig) -> Self {
        debug_assert!(config.validate().is_ok());
        SafepointSync {
            registry,
            config,
            pending: AtomicBool::new(false),
            rendezvous: Mutex::new(Rendezvous { pending: false }),
            resumed: Condvar::new(),
            stats: SafepointStats::new(),
        }
    }

    /// Check whether a pause is currently pending.
    #[inline]
    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Request a global pause.
    ///
    /// Sets the pause-pending flag, then blocks until every registered
    /// thread is in a safepoint-safe state. Threads parked in cooperative
    /// blocking calls count as safe without waking.
    ///
    /// The requester must not itself be a registered mutator thread, and
    /// pauses must not overlap; both are usage errors.
    ///
    /// # Returns
    ///
    /// A guard that keeps the world stopped until dropped.
    pub fn request(&self) -> PauseGuard<'_> {
        let start = Instant::now();
        self.begin_pause();
        self.wait_until_all_safe(None);
        self.stats.record_ready(start.elapsed());
        PauseGuard {
            sync: self,
            start_time: start,
        }
    }

    /// Request a global pause with a bound on the readiness wait.
    ///
    /// # Returns
    ///
    /// `Some(guard)` once all threads are safe, `None` if `timeout` elapsed
    /// first. On timeout the pending flag is cleared and any threads that
    /// already joined are released.
    pub fn try_request(&self, timeout: Duration) -> Option<PauseGuard<'_>> {
        let start = Instant::now();
        self.begin_pause();
        if !self.wait_until_all_safe(Some(start + timeout)) {
            self.end_pause();
            return None;
        }
        self.stats.record_ready(start.elapsed());
        Some(PauseGuard {
            sync: self,
            start_time: start,
        })
    }

    /// Cooperate with a pending pause, if any.
    ///
    /// No-op when no pause is pending. Otherwise the calling thread
    /// publishes `AtSafepoint`, parks until the pause completes, and
    /// restores its previous state before returning. Called by the blocking
    /// guards at both checkpoint sites; may also be called directly from
    /// poll sites in interpreter or JIT code.
    #[inline]
    pub fn join_if_pending(&self, thread: &ThreadContext) {
        if !self.pending.load(Ordering::Acquire) {
            return;
        }
        self.join_slow(thread);
    }

    /// Rendezvous statistics.
    #[inline]
    pub fn stats(&self) -> &SafepointStats {
        &self.stats
    }

    /// The registry this rendezvous polls.
    #[inline]
    pub fn registry(&self) -> &Arc<ThreadRegistry> {
        &self.registry
    }

    // =========================================================================
    // Internal Methods
    // =========================================================================

    fn begin_pause(&self) {
        debug_assert!(
            !self.registry.contains(current_thread_id()),
            "pause requester must not be a registered mutator thread"
        );
        self.stats.record_request();

        let mut r = self.rendezvous.lock();
        debug_assert!(!r.pending, "overlapping pause requests");
        r.pending = true;
        // Published while the lock is held so a joiner that saw the flag
        // and took the lock always agrees with the mutex-guarded state.
        self.pending.store(true, Ordering::Release);
    }

    fn end_pause(&self) {
        let mut r = self.rendezvous.lock();
        r.pending = false;
        self.pending.store(false, Ordering::Release);
        drop(r);
        self.resumed.notify_all();
    }

    /// Poll thread states until every registered thread is safe.
    ///
    /// Spin-then-yield, as the window is usually a few poll intervals at
    /// most. Returns `false` only if `deadline` passed first.
    fn wait_until_all_safe(&self, deadline: Option<Instant>) -> bool {
        let mut spin_rounds = 0;
        loop {
            if self.all_threads_safe() {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            if spin_rounds < self.config.spin_rounds {
                for _ in 0..self.config.spins_per_round {
                    std::hint::spin_loop();
                }
                spin_rounds += 1;
            } else {
                std::thread::yield_now();
            }
        }

        // Readiness achieved; count the threads that were exempt because
        // they were parked in a cooperative block.
        let waived = self
            .registry
            .snapshot()
            .iter()
            .filter(|t| t.state() == ThreadState::Blocked)
            .count();
        self.stats.record_waived(waived as u64);
        true
    }

    fn all_threads_safe(&self) -> bool {
        self.registry
            .snapshot()
            .iter()
            .all(|t| t.state().is_safepoint_safe())
    }

    #[cold]
    fn join_slow(&self, thread: &ThreadContext) {
        debug_assert!(thread.is_current(), "a thread may only join on its own behalf");

        let prior = thread.state();
        thread.set_state(ThreadState::AtSafepoint);
        self.stats.record_join();

        let mut r = self.rendezvous.lock();
        while r.pending {
            // The resume broadcast wakes us; the slice bounds the park in
            // case the guard is dropped between our flag check and the wait.
            self.resumed
                .wait_for(&mut r, self.config.join_wait_slice);
        }
        drop(r);

        thread.set_state(prior);
    }
}

// =============================================================================
// PauseGuard
// =============================================================================

/// RAII guard that keeps the world paused until dropped.
///
/// When dropped, clears the pause-pending flag, wakes all threads parked in
/// the rendezvous, and records the pause duration.
pub struct PauseGuard<'a> {
    sync: &'a SafepointSync,
    start_time: Instant,
}

impl PauseGuard<'_> {
    /// Duration since the pause was requested.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.sync.end_pause();
        self.sync.stats.record_pause_duration(self.start_time.elapsed());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn new_sync() -> (Arc<ThreadRegistry>, SafepointSync) {
        let registry = Arc::new(ThreadRegistry::new());
        let sync = SafepointSync::new(Arc::clone(&registry), SyncConfig::default());
        (registry, sync)
    }

    #[test]
    fn test_request_with_no_threads() {
        let (_registry, sync) = new_sync();
        assert!(!sync.pending());

        let guard = sync.request();
        assert!(sync.pending());
        drop(guard);
        assert!(!sync.pending());

        assert_eq!(sync.stats().requests(), 1);
        assert_eq!(sync.stats().completed(), 1);
    }

    #[test]
    fn test_join_is_noop_without_pause() {
        let (registry, sync) = new_sync();
        let thread = registry.register_current();

        sync.join_if_pending(&thread);
        assert_eq!(thread.state(), ThreadState::Running);
        assert_eq!(sync.stats().joins(), 0);

        registry.unregister(&thread);
    }

    #[test]
    fn test_try_request_times_out_on_running_thread() {
        let (registry, sync) = new_sync();
        let sync = Arc::new(sync);
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let thread = registry.register_current();
                // Stay Running, never polling, until told to stop.
                while !stop.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                registry.unregister(&thread);
            })
        };

        // Wait for the worker to appear in the registry.
        while registry.is_empty() {
            std::thread::yield_now();
        }

        let result = sync.try_request(Duration::from_millis(20));
        assert!(result.is_none());
        assert!(!sync.pending());

        stop.store(true, Ordering::Release);
        worker.join().unwrap();

        // With the registry empty again, a pause succeeds immediately.
        let guard = sync.request();
        drop(guard);
    }

    #[test]
    fn test_running_thread_joins_pending_pause() {
        let (registry, sync) = new_sync();
        let sync = Arc::new(sync);

        let worker = {
            let registry = Arc::clone(&registry);
            let sync = Arc::clone(&sync);
            std::thread::spawn(move || {
                let thread = registry.register_current();
                // Poll until a pause is requested, then join it.
                while !sync.pending() {
                    std::thread::yield_now();
                }
                sync.join_if_pending(&thread);
                let state_after = thread.state();
                registry.unregister(&thread);
                state_after
            })
        };

        while registry.is_empty() {
            std::thread::yield_now();
        }

        let guard = sync.request();
        // The worker is parked in the rendezvous.
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state(), ThreadState::AtSafepoint);
        drop(guard);

        // join_if_pending restored the previous state before returning.
        assert_eq!(worker.join().unwrap(), ThreadState::Running);
        assert_eq!(sync.stats().joins(), 1);
    }

    #[test]
    fn test_pause_guard_elapsed_advances() {
        let (_registry, sync) = new_sync();
        let guard = sync.request();
        std::thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed() >= Duration::from_millis(5));
    }
}
