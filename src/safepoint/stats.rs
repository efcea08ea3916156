//! Pause rendezvous statistics.
//!
//! Tracks how often the world is stopped, how long readiness takes, and how
//! many threads were exempt because they were already parked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// =============================================================================
// SafepointStats
// =============================================================================

/// Statistics for pause rendezvous operations.
///
/// All counters are updated atomically for thread safety.
#[derive(Debug)]
pub struct SafepointStats {
    /// Total number of pause requests.
    requests: AtomicU64,

    /// Number of completed pauses.
    completed: AtomicU64,

    /// Total time spent waiting for threads to reach safety (nanoseconds).
    ready_time_ns: AtomicU64,

    /// Total pause duration (nanoseconds).
    pause_time_ns: AtomicU64,

    /// Maximum pause duration seen (nanoseconds).
    max_pause_ns: AtomicU64,

    /// Minimum pause duration seen (nanoseconds).
    min_pause_ns: AtomicU64,

    /// Threads that parked in the rendezvous to acknowledge a pause.
    joins: AtomicU64,

    /// Threads skipped by readiness checks because they were already parked
    /// in a cooperative blocking call.
    blocked_waivers: AtomicU64,
}

impl SafepointStats {
    /// Create new zeroed statistics.
    pub fn new() -> Self {
        SafepointStats {
            requests: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            ready_time_ns: AtomicU64::new(0),
            pause_time_ns: AtomicU64::new(0),
            max_pause_ns: AtomicU64::new(0),
            min_pause_ns: AtomicU64::new(u64::MAX),
            joins: AtomicU64::new(0),
            blocked_waivers: AtomicU64::new(0),
        }
    }

    /// Record a pause request.
    #[inline]
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time taken for all threads to reach safety.
    #[inline]
    pub fn record_ready(&self, time: Duration) {
        let nanos = time.as_nanos() as u64;
        self.ready_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Record a completed pause and its total duration.
    pub fn record_pause_duration(&self, duration: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let nanos = duration.as_nanos() as u64;
        self.pause_time_ns.fetch_add(nanos, Ordering::Relaxed);

        // Update max
        let mut current = self.max_pause_ns.load(Ordering::Relaxed);
        while nanos > current {
            match self.max_pause_ns.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }

        // Update min
        current = self.min_pause_ns.load(Ordering::Relaxed);
        while nanos < current {
            match self.min_pause_ns.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }
    }

    /// Record a thread parking in the rendezvous.
    #[inline]
    pub fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    /// Record threads waived by a readiness check because they were parked.
    #[inline]
    pub fn record_waived(&self, count: u64) {
        self.blocked_waivers.fetch_add(count, Ordering::Relaxed);
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get total pause requests.
    #[inline]
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Get completed pause count.
    #[inline]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get total rendezvous joins.
    #[inline]
    pub fn joins(&self) -> u64 {
        self.joins.load(Ordering::Relaxed)
    }

    /// Get total blocked-thread waivers.
    #[inline]
    pub fn blocked_waivers(&self) -> u64 {
        self.blocked_waivers.load(Ordering::Relaxed)
    }

    /// Get average time to reach readiness.
    #[inline]
    pub fn avg_ready_time(&self) -> Duration {
        let total = self.ready_time_ns.load(Ordering::Relaxed);
        let count = self.requests.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(total / count)
    }

    /// Get average pause duration.
    #[inline]
    pub fn avg_pause_time(&self) -> Duration {
        let total = self.pause_time_ns.load(Ordering::Relaxed);
        let count = self.completed.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(total / count)
    }

    /// Get maximum pause duration.
    #[inline]
    pub fn max_pause_time(&self) -> Duration {
        let nanos = self.max_pause_ns.load(Ordering::Relaxed);
        if nanos == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(nanos)
        }
    }

    /// Get minimum pause duration.
    #[inline]
    pub fn min_pause_time(&self) -> Duration {
        let nanos = self.min_pause_ns.load(Ordering::Relaxed);
        if nanos == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_nanos(nanos)
        }
    }

    /// Get total pause time.
    #[inline]
    pub fn total_pause_time(&self) -> Duration {
        Duration::from_nanos(self.pause_time_ns.load(Ordering::Relaxed))
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.ready_time_ns.store(0, Ordering::Relaxed);
        self.pause_time_ns.store(0, Ordering::Relaxed);
        self.max_pause_ns.store(0, Ordering::Relaxed);
        self.min_pause_ns.store(u64::MAX, Ordering::Relaxed);
        self.joins.store(0, Ordering::Relaxed);
        self.blocked_waivers.store(0, Ordering::Relaxed);
    }
}

impl Default for SafepointStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SafepointStats {
    fn clone(&self) -> Self {
        SafepointStats {
            requests: AtomicU64::new(self.requests.load(Ordering::Relaxed)),
            completed: AtomicU64::new(self.completed.load(Ordering::Relaxed)),
            ready_time_ns: AtomicU64::new(self.ready_time_ns.load(Ordering::Relaxed)),
            pause_time_ns: AtomicU64::new(self.pause_time_ns.load(Ordering::Relaxed)),
            max_pause_ns: AtomicU64::new(self.max_pause_ns.load(Ordering::Relaxed)),
            min_pause_ns: AtomicU64::new(self.min_pause_ns.load(Ordering::Relaxed)),
            joins: AtomicU64::new(self.joins.load(Ordering::Relaxed)),
            blocked_waivers: AtomicU64::new(self.blocked_waivers.load(Ordering::Relaxed)),
        }
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl std::fmt::Display for SafepointStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pause Statistics:")?;
        writeln!(f, "  Requests:        {}", self.requests())?;
        writeln!(f, "  Completed:       {}", self.completed())?;
        writeln!(f, "  Avg Ready:       {:?}", self.avg_ready_time())?;
        writeln!(f, "  Avg Pause:       {:?}", self.avg_pause_time())?;
        writeln!(f, "  Max Pause:       {:?}", self.max_pause_time())?;
        writeln!(f, "  Min Pause:       {:?}", self.min_pause_time())?;
        writeln!(f, "  Total Pause:     {:?}", self.total_pause_time())?;
        writeln!(f, "  Joins:           {}", self.joins())?;
        writeln!(f, "  Blocked Waivers: {}", self.blocked_waivers())?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = SafepointStats::new();
        assert_eq!(stats.requests(), 0);
        assert_eq!(stats.completed(), 0);
        assert_eq!(stats.joins(), 0);
        assert_eq!(stats.blocked_waivers(), 0);
    }

    #[test]
    fn test_stats_record_request() {
        let stats = SafepointStats::new();
        stats.record_request();
        stats.record_request();
        assert_eq!(stats.requests(), 2);
    }

    #[test]
    fn test_stats_ready_time_averages() {
        let stats = SafepointStats::new();
        stats.record_request();
        stats.record_ready(Duration::from_micros(100));
        stats.record_request();
        stats.record_ready(Duration::from_micros(200));
        assert_eq!(stats.avg_ready_time(), Duration::from_micros(150));
    }

    #[test]
    fn test_stats_pause_duration_min_max() {
        let stats = SafepointStats::new();
        stats.record_pause_duration(Duration::from_millis(10));
        stats.record_pause_duration(Duration::from_millis(20));

        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.min_pause_time(), Duration::from_millis(10));
        assert_eq!(stats.max_pause_time(), Duration::from_millis(20));
        assert_eq!(stats.avg_pause_time(), Duration::from_millis(15));
    }

    #[test]
    fn test_stats_waivers_accumulate() {
        let stats = SafepointStats::new();
        stats.record_waived(2);
        stats.record_waived(3);
        assert_eq!(stats.blocked_waivers(), 5);
    }

    #[test]
    fn test_stats_reset() {
        let stats = SafepointStats::new();
        stats.record_request();
        stats.record_join();
        stats.reset();

        assert_eq!(stats.requests(), 0);
        assert_eq!(stats.joins(), 0);
        assert_eq!(stats.min_pause_time(), Duration::ZERO);
    }

    #[test]
    fn test_stats_clone() {
        let stats = SafepointStats::new();
        stats.record_request();
        stats.record_join();

        let cloned = stats.clone();
        assert_eq!(cloned.requests(), 1);
        assert_eq!(cloned.joins(), 1);
    }

    #[test]
    fn test_stats_display() {
        let stats = SafepointStats::new();
        stats.record_request();

        let display = format!("{}", stats);
        assert!(display.contains("Pause Statistics"));
        assert!(display.contains("Blocked Waivers"));
    }
}
