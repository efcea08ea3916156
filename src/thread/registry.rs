//! Mutator thread registration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{ThreadContext, current_thread_id, set_current_thread_id};

/// Registry of live mutator threads.
///
/// The pause requester snapshots the registry on every readiness poll, so
/// registration and unregistration stay cheap and the read path takes no
/// exclusive lock.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: RwLock<FxHashMap<u64, Arc<ThreadContext>>>,
    next_id: AtomicU64,
}

impl ThreadRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ThreadRegistry {
            threads: RwLock::new(FxHashMap::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register the calling OS thread and bind a fresh context to it.
    ///
    /// The thread starts in the `Running` state. Registering a thread that
    /// is already registered is a usage error.
    pub fn register_current(&self) -> Arc<ThreadContext> {
        debug_assert_eq!(current_thread_id(), 0, "thread is already registered");

        // Ids start at 1; 0 is the unregistered sentinel.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let thread = Arc::new(ThreadContext::new(id));

        self.threads.write().insert(id, Arc::clone(&thread));
        set_current_thread_id(id);
        thread
    }

    /// Remove a thread from the registry.
    ///
    /// If called by the owning thread, the current-thread binding is cleared
    /// as well. A thread no longer in the registry is invisible to the pause
    /// readiness check.
    pub fn unregister(&self, thread: &ThreadContext) {
        if thread.is_current() {
            set_current_thread_id(0);
        }
        self.threads.write().remove(&thread.id());
    }

    /// Look up a registered thread by id.
    pub fn get(&self, id: u64) -> Option<Arc<ThreadContext>> {
        self.threads.read().get(&id).cloned()
    }

    /// Check whether an id is registered.
    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.threads.read().contains_key(&id)
    }

    /// Snapshot of all registered threads.
    ///
    /// Inline capacity covers typical mutator counts so the readiness poll
    /// does not allocate.
    pub fn snapshot(&self) -> SmallVec<[Arc<ThreadContext>; 8]> {
        self.threads.read().values().cloned().collect()
    }

    /// Number of registered threads.
    #[inline]
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    /// Check whether the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadState;

    #[test]
    fn test_register_unregister() {
        let registry = ThreadRegistry::new();
        assert!(registry.is_empty());

        let thread = registry.register_current();
        assert_eq!(registry.len(), 1);
        assert!(thread.is_current());
        assert!(registry.contains(thread.id()));

        registry.unregister(&thread);
        assert!(registry.is_empty());
        assert!(!thread.is_current());
    }

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let registry = Arc::new(ThreadRegistry::new());
        let a = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let t = registry.register_current();
                let id = t.id();
                registry.unregister(&t);
                id
            })
            .join()
            .unwrap()
        };
        let b = registry.register_current();
        assert_ne!(a, 0);
        assert_ne!(b.id(), 0);
        assert_ne!(a, b.id());
        registry.unregister(&b);
    }

    #[test]
    fn test_snapshot_sees_registered_threads() {
        let registry = Arc::new(ThreadRegistry::new());
        let thread = registry.register_current();
        thread.set_state(ThreadState::Native);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state(), ThreadState::Native);

        thread.set_state(ThreadState::Running);
        registry.unregister(&thread);
    }

    #[test]
    fn test_get_by_id() {
        let registry = ThreadRegistry::new();
        let thread = registry.register_current();
        let found = registry.get(thread.id()).expect("thread should be present");
        assert_eq!(found.id(), thread.id());
        assert!(registry.get(thread.id() + 1).is_none());
        registry.unregister(&thread);
    }
}
