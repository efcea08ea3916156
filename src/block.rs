//! Scoped state transitions around blocking calls.
//!
//! Any call that can park a mutator thread for an unbounded time must be
//! bracketed by [`ThreadBlockScope`]: the thread publishes `Blocked` so the
//! pause protocol can proceed without it, and cooperates with any pause that
//! is pending when it enters or that arrived while it was parked. Release is
//! guaranteed on every exit path via `Drop`, in reverse order of entry.
//!
//! The per-thread state machine for one composed wait:
//!
//! ```text
//! Running → (pre-check pause) → Blocked → ··· semaphore wait ···
//!         → Running → (post-check pause) → caller resumes
//! ```
//!
//! Both pause checks are load-bearing. The entry check prevents a thread
//! from announcing "safe to pause" when it should first be acknowledging a
//! pause that is already under way; the exit check guarantees that no thread
//! resumes managed code with an unacknowledged pause outstanding. Together
//! they close the missed-wakeup races at the edges of the blocked window.

use std::sync::Arc;

use crate::safepoint::SafepointSync;
use crate::semaphore::Semaphore;
use crate::thread::{ThreadContext, ThreadState, WaitReason, WAIT_PRIMARY_BIT, WAIT_REASON_MASK};

// =============================================================================
// ThreadBlockScope
// =============================================================================

/// Marks the current thread as parked and safe to pause for the duration of
/// a blocking call.
///
/// Entry requires the thread to be `Running`; entering from any other state
/// (including re-entry from an enclosing scope on the same thread) is a
/// usage error, fatal in debug builds.
pub struct ThreadBlockScope<'a> {
    thread: &'a ThreadContext,
    sync: &'a SafepointSync,
}

impl<'a> ThreadBlockScope<'a> {
    /// Enter the blocked state.
    ///
    /// If a pause is already pending the thread joins it here, before
    /// announcing `Blocked`, so a pause requested just ahead of the block
    /// is acknowledged rather than raced.
    pub fn new(thread: &'a ThreadContext, sync: &'a SafepointSync) -> Self {
        debug_assert!(thread.is_current(), "blocking scope entered for a foreign thread");
        debug_assert_eq!(
            thread.state(),
            ThreadState::Running,
            "blocking scope entered from a non-running state"
        );

        sync.join_if_pending(thread);
        thread.set_state(ThreadState::Blocked);

        ThreadBlockScope { thread, sync }
    }
}

impl Drop for ThreadBlockScope<'_> {
    fn drop(&mut self) {
        self.thread.set_state(ThreadState::Running);
        // A pause that became pending while we were parked must be
        // acknowledged before the caller resumes managed code.
        self.sync.join_if_pending(self.thread);
    }
}

// =============================================================================
// WaitReasonScope
// =============================================================================

/// Records why the current thread is parked, for external inspection.
///
/// Cosmetic only: the tag never influences scheduling or pause cooperation.
/// The previous tag is restored on drop, so nested scopes compose. At most
/// one primary reason may be active per thread.
pub struct WaitReasonScope<'a> {
    thread: &'a ThreadContext,
    saved: u32,
}

impl<'a> WaitReasonScope<'a> {
    /// Tag the current thread's wait site.
    ///
    /// `primary` marks an application-visible wait, as opposed to a wait
    /// internal to the runtime.
    pub fn new(thread: &'a ThreadContext, reason: WaitReason, primary: bool) -> Self {
        let saved = thread.wait_reason_raw();
        debug_assert!(
            !primary || saved & WAIT_PRIMARY_BIT == 0,
            "nested primary wait reasons on one thread"
        );

        let mut raw = reason as u32 & WAIT_REASON_MASK;
        if primary {
            raw |= WAIT_PRIMARY_BIT;
        }
        thread.set_wait_reason_raw(raw);

        WaitReasonScope { thread, saved }
    }
}

impl Drop for WaitReasonScope<'_> {
    fn drop(&mut self) {
        self.thread.set_wait_reason_raw(self.saved);
    }
}

// =============================================================================
// Composed operation
// =============================================================================

impl Semaphore {
    /// Block on the semaphore while remaining cooperative with global
    /// pauses.
    ///
    /// While parked the thread reads as `Blocked`, so a pause can reach
    /// readiness without waking it. Any pause pending at entry is joined
    /// before blocking; any pause that became pending during the block is
    /// joined after waking, before this call returns.
    ///
    /// Must be called by `thread` on its own behalf; calling it for another
    /// thread, or while already inside a blocking scope on this thread, is
    /// a usage error, fatal in debug builds.
    ///
    /// On return the count has been decremented exactly once and the thread
    /// is `Running`. Unbounded; OS-primitive failure aborts the process.
    pub fn wait_with_safepoint_check(&self, thread: &Arc<ThreadContext>, sync: &SafepointSync) {
        debug_assert!(
            thread.is_current(),
            "wait_with_safepoint_check called for a foreign thread"
        );

        let _block = ThreadBlockScope::new(thread, sync);
        // Runtime-internal wait, not an application-level one.
        let _reason = WaitReasonScope::new(thread, WaitReason::Semaphore, false);
        self.wait();
        // _reason drops first, then _block republishes Running and runs the
        // exit-side pause check.
    }
}

// =============================================================================
// Tests
// =============================================================================
