//! Vesper Runtime Synchronization
//!
//! Safepoint-aware blocking primitives for mutator threads.
//!
//! A mutator thread must be able to block indefinitely (on a semaphore, a
//! condition, an I/O completion) without stalling the runtime's ability to
//! reach a global pause for GC or deoptimization. This crate provides the
//! state-transition discipline that makes that safe: a thread announces
//! "parked, safe to pause" before it blocks, and cooperates with any pause
//! that became pending before it resumes managed code.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Semaphore::wait_with_safepoint_check                       │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │  ThreadBlockScope   (Running → Blocked, pause check) │   │
//! │  │  ┌────────────────────────────────────────────────┐  │   │
//! │  │  │  WaitReasonScope  (diagnostic tag only)        │  │   │
//! │  │  │  Semaphore::wait()     ← single blocking point │  │   │
//! │  │  └────────────────────────────────────────────────┘  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SafepointSync                                              │
//! │  - request() → wait for all threads safe, RAII PauseGuard   │
//! │  - join_if_pending() → park until the pause completes       │
//! │  - Blocked threads are exempt from the readiness check      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # The two-sided pause check
//!
//! `ThreadBlockScope` checks for a pending pause at entry (before publishing
//! `Blocked`) and again at exit (after republishing `Running`). Both checks
//! are required: the entry check closes the race between "pause requested"
//! and "about to block", the exit check guarantees no thread resumes managed
//! code while a pause that started during the block is still outstanding.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vesper_sync::{SafepointSync, Semaphore, SyncConfig, ThreadRegistry};
//!
//! let registry = Arc::new(ThreadRegistry::new());
//! let sync = Arc::new(SafepointSync::new(Arc::clone(&registry), SyncConfig::default()));
//! let sem = Arc::new(Semaphore::new(0));
//!
//! // On a mutator thread:
//! let thread = registry.register_current();
//! sem.wait_with_safepoint_check(&thread, &sync);
//!
//! // On the coordinator thread:
//! let pause = sync.request(); // succeeds even while mutators are parked
//! // ... scan stacks, patch code ...
//! drop(pause);                // wake joiners
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod config;
pub mod safepoint;
pub mod semaphore;
pub mod thread;

// Re-exports for convenient access
pub use block::{ThreadBlockScope, WaitReasonScope};
pub use config::{ConfigError, SyncConfig};
pub use safepoint::{PauseGuard, SafepointStats, SafepointSync};
pub use semaphore::Semaphore;
pub use thread::{ThreadContext, ThreadRegistry, ThreadState, WaitReason};
