//! Per-thread execution state.
//!
//! Each mutator thread owns a [`ThreadContext`] holding its execution state
//! and current wait reason. The state field is the contract between a thread
//! and the pause protocol: the owning thread is the only writer, the pause
//! requester reads it cross-thread, so stores are release and loads are
//! acquire. The requester never observes a thread as `Running` once it has
//! published `Blocked` and parked.

mod registry;

pub use registry::ThreadRegistry;

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// ThreadState
// =============================================================================

/// Execution state of a mutator thread with respect to the pause protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Running managed code; must reach safety before a pause can begin.
    Running = 0,
    /// Parked in a cooperative blocking call; already safe, exempt from the
    /// readiness check.
    Blocked = 1,
    /// Parked inside the pause rendezvous, waiting for the resume broadcast.
    AtSafepoint = 2,
    /// Executing native code outside the managed heap; already safe.
    Native = 3,
}

impl ThreadState {
    /// Convert from raw u32 value.
    #[inline]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(ThreadState::Running),
            1 => Some(ThreadState::Blocked),
            2 => Some(ThreadState::AtSafepoint),
            3 => Some(ThreadState::Native),
            _ => None,
        }
    }

    /// Check whether a thread in this state may be skipped by the pause
    /// readiness check.
    #[inline]
    pub fn is_safepoint_safe(self) -> bool {
        matches!(
            self,
            ThreadState::Blocked | ThreadState::AtSafepoint | ThreadState::Native
        )
    }
}

// =============================================================================
// WaitReason
// =============================================================================

/// Why a thread is currently parked.
///
/// Purely diagnostic: monitoring tooling reads this to distinguish wait
/// sites. It has no effect on scheduling or pause cooperation.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Not parked, or parked at an untagged site.
    Idle = 0,
    /// Parked in a semaphore wait.
    Semaphore = 1,
    /// Parked in a condition-variable wait.
    Condvar = 2,
}

impl WaitReason {
    /// Convert from raw u32 value.
    #[inline]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(WaitReason::Idle),
            1 => Some(WaitReason::Semaphore),
            2 => Some(WaitReason::Condvar),
            _ => None,
        }
    }
}

/// Bit set in the packed wait-reason word when the wait is the primary,
/// application-visible reason rather than a nested internal one.
pub(crate) const WAIT_PRIMARY_BIT: u32 = 1 << 8;

pub(crate) const WAIT_REASON_MASK: u32 = WAIT_PRIMARY_BIT - 1;

// =============================================================================
// ThreadContext
// =============================================================================

thread_local! {
    /// Registry id of the thread context bound to this OS thread, 0 if none.
    static CURRENT_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Per-thread context registered with the runtime.
///
/// The state and wait-reason fields are mutated only by the owning thread;
/// other threads (the pause requester, diagnostics) read them with acquire
/// loads.
#[derive(Debug)]
pub struct ThreadContext {
    /// Registry-assigned id, nonzero.
    id: u64,
    /// Current `ThreadState`, stored raw.
    state: AtomicU32,
    /// Packed `WaitReason` plus the primary bit.
    wait_reason: AtomicU32,
}

impl ThreadContext {
    pub(crate) fn new(id: u64) -> Self {
        ThreadContext {
            id,
            state: AtomicU32::new(ThreadState::Running as u32),
            wait_reason: AtomicU32::new(WaitReason::Idle as u32),
        }
    }

    /// Registry-assigned thread id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current execution state.
    #[inline]
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u32(self.state.load(Ordering::Acquire)).unwrap_or(ThreadState::Running)
    }

    /// Publish a new execution state.
    ///
    /// Must be called by the owning thread only; the pause protocol relies
    /// on single-writer semantics for this field.
    #[inline]
    pub fn set_state(&self, state: ThreadState) {
        debug_assert!(self.is_current(), "thread state mutated cross-thread");
        self.state.store(state as u32, Ordering::Release);
    }

    /// Current wait reason and whether it is the primary reason.
    #[inline]
    pub fn wait_reason(&self) -> (WaitReason, bool) {
        let raw = self.wait_reason.load(Ordering::Acquire);
        let reason = WaitReason::from_u32(raw & WAIT_REASON_MASK).unwrap_or(WaitReason::Idle);
        (reason, raw & WAIT_PRIMARY_BIT != 0)
    }

    #[inline]
    pub(crate) fn wait_reason_raw(&self) -> u32 {
        self.wait_reason.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_wait_reason_raw(&self, raw: u32) {
        self.wait_reason.store(raw, Ordering::Release);
    }

    /// Check whether this context is bound to the calling OS thread.
    #[inline]
    pub fn is_current(&self) -> bool {
        CURRENT_THREAD_ID.with(|c| c.get()) == self.id
    }
}

/// Registry id bound to the calling OS thread, 0 if unregistered.
#[inline]
pub(crate) fn current_thread_id() -> u64 {
    CURRENT_THREAD_ID.with(|c| c.get())
}

pub(crate) fn set_current_thread_id(id: u64) {
    CURRENT_THREAD_ID.with(|c| c.set(id));
}

// =============================================================================
// Tests
// =============================================================================
