//! Global pause rendezvous.
//!
//! The runtime occasionally needs every mutator thread at a known-safe point
//! (GC, deoptimization). [`SafepointSync`] provides the rendezvous:
//!
//! 1. The coordinator calls [`SafepointSync::request`], which sets the
//!    pause-pending flag and waits for every registered thread to be in a
//!    safepoint-safe state.
//! 2. Running threads reach safety by calling
//!    [`SafepointSync::join_if_pending`] at their poll sites; threads parked
//!    in a cooperative blocking call are already safe and are skipped.
//! 3. The returned [`PauseGuard`] keeps the world stopped; dropping it
//!    clears the flag and wakes every joiner.

mod stats;
mod sync;

pub use stats::SafepointStats;
pub use sync::{PauseGuard, SafepointSync};
