//! Counting semaphore backed by the OS primitive.
//!
//! The semaphore is a leaf: it knows nothing about threads, registries, or
//! safepoints. Safepoint cooperation is layered on top by
//! [`Semaphore::wait_with_safepoint_check`](crate::block).
//!
//! # Platform Support
//!
//! | Platform     | Mechanism |
//! |--------------|-----------|
//! | Linux        | unnamed POSIX `sem_t` |
//! | Windows      | kernel semaphore via `CreateSemaphoreW` |
//! | Other Unix   | `parking_lot` mutex + condvar (macOS has no unnamed `sem_t`) |
//!
//! # Failure Policy
//!
//! A synchronization primitive that stops working invalidates every
//! coordination guarantee built on it, so OS-level failure is process-fatal:
//! the error is written to stderr and the process aborts. There is no
//! recoverable error surface on this type.

use std::time::Duration;

// =============================================================================
// Semaphore
// =============================================================================

/// A counting semaphore.
///
/// `wait` blocks until the count is positive, then atomically decrements it.
/// `signal` increments the count and wakes one waiter. A return from `wait`
/// always corresponds to exactly one prior `signal` (or the initial count);
/// callers never observe a spurious wake.
///
/// The semaphore is shared by reference (`&Semaphore` or `Arc<Semaphore>`);
/// the counter itself is never transferred between owners.
pub struct Semaphore {
    imp: SemaphoreImpl,
}

impl Semaphore {
    /// Create a semaphore with the given initial count.
    ///
    /// Aborts the process if the OS primitive cannot be created.
    pub fn new(initial: u32) -> Self {
        Semaphore {
            imp: SemaphoreImpl::new(initial),
        }
    }

    /// Block until the count is positive, then decrement it.
    ///
    /// Unbounded: only a `signal` (or the initial count) releases the caller.
    /// Aborts the process on OS-primitive failure.
    pub fn wait(&self) {
        self.imp.wait();
    }

    /// Attempt to decrement the count without blocking.
    ///
    /// Returns `true` if the count was positive and has been decremented.
    pub fn try_wait(&self) -> bool {
        self.imp.try_wait()
    }

    /// Block until the count is positive or `timeout` elapses.
    ///
    /// Returns `true` if the count was decremented, `false` on timeout.
    pub fn timed_wait(&self, timeout: Duration) -> bool {
        self.imp.timed_wait(timeout)
    }

    /// Increment the count, waking one blocked waiter.
    ///
    /// Never blocks. Concurrent signals are safe and additive.
    #[inline]
    pub fn signal(&self) {
        self.imp.signal_n(1);
    }

    /// Increment the count by `n`, waking up to `n` blocked waiters.
    pub fn signal_n(&self, n: u32) {
        self.imp.signal_n(n);
    }
}

/// Abort after an unrecoverable OS-primitive failure.
#[cfg(any(target_os = "linux", windows))]
#[cold]
fn fatal(op: &str) -> ! {
    eprintln!(
        "vesper_sync: semaphore {} failed: {}",
        op,
        std::io::Error::last_os_error()
    );
    std::process::abort();
}

// =============================================================================
// Platform-specific implementation
// =============================================================================

#[cfg(target_os = "linux")]
struct SemaphoreImpl {
    // Boxed so the sem_t has a stable address for the lifetime of the
    // semaphore even if the owning struct moves.
    sem: Box<std::cell::UnsafeCell<libc::sem_t>>,
}

// Safety: sem_t is designed for concurrent access from multiple threads;
// all mutation goes through sem_* calls.
#[cfg(target_os = "linux")]
unsafe impl Send for SemaphoreImpl {}
#[cfg(target_os = "linux")]
unsafe impl Sync for SemaphoreImpl {}

#[cfg(target_os = "linux")]
impl SemaphoreImpl {
    fn new(initial: u32) -> Self {
        let sem = Box::new(std::cell::UnsafeCell::new(unsafe {
            std::mem::zeroed::<libc::sem_t>()
        }));
        // pshared = 0: shared between threads of this process only.
        if unsafe { libc::sem_init(sem.get(), 0, initial) } != 0 {
            fatal("sem_init");
        }
        SemaphoreImpl { sem }
    }

    fn wait(&self) {
        loop {
            if unsafe { libc::sem_wait(self.sem.get()) } == 0 {
                return;
            }
            if errno() != libc::EINTR {
                fatal("sem_wait");
            }
        }
    }

    fn try_wait(&self) -> bool {
        loop {
            if unsafe { libc::sem_trywait(self.sem.get()) } == 0 {
                return true;
            }
            match errno() {
                libc::EAGAIN => return false,
                libc::EINTR => continue,
                _ => fatal("sem_trywait"),
            }
        }
    }

    fn timed_wait(&self, timeout: Duration) -> bool {
        let deadline = Self::deadline(timeout);
        loop {
            if unsafe { libc::sem_timedwait(self.sem.get(), &deadline) } == 0 {
                return true;
            }
            match errno() {
                libc::ETIMEDOUT => return false,
                libc::EINTR => continue,
                _ => fatal("sem_timedwait"),
            }
        }
    }

    fn signal_n(&self, n: u32) {
        for _ in 0..n {
            if unsafe { libc::sem_post(self.sem.get()) } != 0 {
                fatal("sem_post");
            }
        }
    }

    /// Absolute CLOCK_REALTIME deadline, as sem_timedwait requires.
    fn deadline(timeout: Duration) -> libc::timespec {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) } != 0 {
            fatal("clock_gettime");
        }
        let nsec = ts.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
        ts.tv_sec += timeout.as_secs() as libc::time_t + (nsec / 1_000_000_000) as libc::time_t;
        ts.tv_nsec = (nsec % 1_000_000_000) as libc::c_long;
        ts
    }
}

#[cfg(target_os = "linux")]
impl Drop for SemaphoreImpl {
    fn drop(&mut self) {
        unsafe {
            libc::sem_destroy(self.sem.get());
        }
    }
}

#[cfg(target_os = "linux")]
fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(all(unix, not(target_os = "linux")))]
struct SemaphoreImpl {
    count: parking_lot::Mutex<u32>,
    available: parking_lot::Condvar,
}

#[cfg(all(unix, not(target_os = "linux")))]
impl SemaphoreImpl {
    fn new(initial: u32) -> Self {
        SemaphoreImpl {
            count: parking_lot::Mutex::new(initial),
            available: parking_lot::Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    fn timed_wait(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut count = self.count.lock();
        loop {
            if *count > 0 {
                *count -= 1;
                return true;
            }
            if self.available.wait_until(&mut count, deadline).timed_out() {
                // One last chance: a signal may have landed with the timeout.
                if *count > 0 {
                    *count -= 1;
                    return true;
                }
                return false;
            }
        }
    }

    fn signal_n(&self, n: u32) {
        let mut count = self.count.lock();
        *count += n;
        drop(count);
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }
}

#[cfg(windows)]
struct SemaphoreImpl {
    handle: windows_sys::Win32::Foundation::HANDLE,
}

// Safety: semaphore handles are valid from any thread.
#[cfg(windows)]
unsafe impl Send for SemaphoreImpl {}
#[cfg(windows)]
unsafe impl Sync for SemaphoreImpl {}

#[cfg(windows)]
impl SemaphoreImpl {
    fn new(initial: u32) -> Self {
        use windows_sys::Win32::System::Threading::CreateSemaphoreW;

        let handle = unsafe {
            CreateSemaphoreW(
                std::ptr::null(),
                initial as i32,
                i32::MAX,
                std::ptr::null(),
            )
        };
        if handle.is_null() {
            fatal("CreateSemaphoreW");
        }
        SemaphoreImpl { handle }
    }

    fn wait(&self) {
        use windows_sys::Win32::Foundation::WAIT_OBJECT_0;
        use windows_sys::Win32::System::Threading::{INFINITE, WaitForSingleObject};

        if unsafe { WaitForSingleObject(self.handle, INFINITE) } != WAIT_OBJECT_0 {
            fatal("WaitForSingleObject");
        }
    }

    fn try_wait(&self) -> bool {
        self.wait_millis(0)
    }

    fn timed_wait(&self, timeout: Duration) -> bool {
        // INFINITE is u32::MAX; clamp just below it.
        let millis = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
        self.wait_millis(millis)
    }

    fn wait_millis(&self, millis: u32) -> bool {
        use windows_sys::Win32::Foundation::{WAIT_OBJECT_0, WAIT_TIMEOUT};
        use windows_sys::Win32::System::Threading::WaitForSingleObject;

        match unsafe { WaitForSingleObject(self.handle, millis) } {
            WAIT_OBJECT_0 => true,
            WAIT_TIMEOUT => false,
            _ => fatal("WaitForSingleObject"),
        }
    }

    fn signal_n(&self, n: u32) {
        use windows_sys::Win32::System::Threading::ReleaseSemaphore;

        if unsafe { ReleaseSemaphore(self.handle, n as i32, std::ptr::null_mut()) } == 0 {
            fatal("ReleaseSemaphore");
        }
    }
}

#[cfg(windows)]
impl Drop for SemaphoreImpl {
    fn drop(&mut self) {
        use windows_sys::Win32::Foundation::CloseHandle;
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_initial_count_is_consumable() {
        let sem = Semaphore::new(2);
        sem.wait();
        sem.wait();
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_signal_then_wait_does_not_block() {
        let sem = Semaphore::new(0);
        sem.signal();
        sem.wait();
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_try_wait_on_empty() {
        let sem = Semaphore::new(0);
        assert!(!sem.try_wait());
        sem.signal();
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_timed_wait_times_out() {
        let sem = Semaphore::new(0);
        let start = std::time::Instant::now();
        assert!(!sem.timed_wait(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_timed_wait_succeeds_with_count() {
        let sem = Semaphore::new(1);
        assert!(sem.timed_wait(Duration::from_millis(50)));
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_cross_thread_wake() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || sem.wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        sem.signal();
        waiter.join().unwrap();
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_signal_n_wakes_multiple() {
        let sem = Arc::new(Semaphore::new(0));
        let woken = Arc::new(AtomicU32::new(0));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let woken = Arc::clone(&woken);
                std::thread::spawn(move || {
                    sem.wait();
                    woken.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        sem.signal_n(3);
        for w in waiters {
            w.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::Acquire), 3);
        assert!(!sem.try_wait());
    }

    #[test]
    fn test_no_over_release() {
        // Completed waits never exceed signals plus the initial count.
        let sem = Semaphore::new(1);
        sem.signal_n(2);
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
    }
}
