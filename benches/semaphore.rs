//! Semaphore and safepoint-wait benchmarks.
//!
//! # Benchmark Categories
//!
//! 1. **Uncontended signal/wait**: the raw OS round trip
//! 2. **try_wait miss**: cost of a failed non-blocking decrement
//! 3. **Composed wait**: guard entry/exit overhead over the raw wait
//!
//! # Performance Targets
//!
//! - Uncontended signal + wait: < 200ns
//! - Guard overhead over raw wait: < 50ns (two atomic stores, two flag loads)

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vesper_sync::{SafepointSync, Semaphore, SyncConfig, ThreadRegistry};

fn bench_uncontended_signal_wait(c: &mut Criterion) {
    let sem = Semaphore::new(0);
    c.bench_function("semaphore_signal_wait", |b| {
        b.iter(|| {
            sem.signal();
            sem.wait();
        })
    });
}

fn bench_try_wait_miss(c: &mut Criterion) {
    let sem = Semaphore::new(0);
    c.bench_function("semaphore_try_wait_miss", |b| {
        b.iter(|| black_box(sem.try_wait()))
    });
}

fn bench_safepoint_wait_uncontended(c: &mut Criterion) {
    let registry = Arc::new(ThreadRegistry::new());
    let sync = SafepointSync::new(Arc::clone(&registry), SyncConfig::default());
    let thread = registry.register_current();
    let sem = Semaphore::new(0);

    c.bench_function("wait_with_safepoint_check", |b| {
        b.iter(|| {
            sem.signal();
            sem.wait_with_safepoint_check(&thread, &sync);
        })
    });

    registry.unregister(&thread);
}

criterion_group!(
    benches,
    bench_uncontended_signal_wait,
    bench_try_wait_miss,
    bench_safepoint_wait_uncontended
);
criterion_main!(benches);
