//! Safepoint synchronization tuning parameters.
//!
//! Defaults are sized for a handful of mutator threads reaching safety
//! within a few microseconds. Workloads with many threads or long native
//! sections may prefer the presets below.

use std::time::Duration;

/// Configuration for [`SafepointSync`](crate::SafepointSync).
///
/// # Example
///
/// ```ignore
/// use vesper_sync::SyncConfig;
///
/// // Coordinator pinned to its own core: spin harder before yielding
/// let config = SyncConfig {
///     spin_rounds: 4000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Spin rounds the pause requester performs before yielding to the
    /// OS scheduler while waiting for threads to reach safety.
    ///
    /// Set to 0 to yield immediately.
    ///
    /// Default: 1000
    pub spin_rounds: u32,

    /// `spin_loop` hints per spin round.
    ///
    /// Default: 10
    pub spins_per_round: u32,

    /// Re-check interval for threads parked in the pause rendezvous.
    ///
    /// Joiners are woken by the resume broadcast; the slice bounds how long
    /// a joiner sleeps between re-checks of the pending flag.
    ///
    /// Default: 10ms
    pub join_wait_slice: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spin_rounds: 1000,
            spins_per_round: 10,
            join_wait_slice: Duration::from_millis(10),
        }
    }
}

impl SyncConfig {
    /// Configuration for latency-sensitive coordinators: spin longer before
    /// involving the scheduler.
    pub fn low_latency() -> Self {
        Self {
            spin_rounds: 10_000,
            ..Default::default()
        }
    }

    /// Configuration for oversubscribed hosts: never spin, yield at once.
    pub fn low_cpu() -> Self {
        Self {
            spin_rounds: 0,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spin_rounds > 0 && self.spins_per_round == 0 {
            return Err(ConfigError::ZeroSpinsPerRound);
        }
        if self.join_wait_slice.is_zero() {
            return Err(ConfigError::ZeroWaitSlice);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `spins_per_round` must be nonzero when spinning is enabled.
    ZeroSpinsPerRound,
    /// `join_wait_slice` must be nonzero.
    ZeroWaitSlice,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroSpinsPerRound => {
                write!(f, "spins per round must be nonzero when spin rounds > 0")
            }
            ConfigError::ZeroWaitSlice => write!(f, "join wait slice must be nonzero"),
        }
    }
}

impl std::error::Error for ConfigError {}
