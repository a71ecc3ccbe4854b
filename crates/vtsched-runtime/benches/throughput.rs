//! Submission throughput benchmarks

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use vtsched_core::clocks::ControllableClock;
use vtsched_runtime::{Scheduler, SchedulerConfig};

fn frozen_sched() -> Scheduler {
    // Frozen clock and processing off: pure queue-path measurement
    let clock = Arc::new(ControllableClock::frozen_at(0));
    let config = SchedulerConfig::new()
        .nbr_of_threads(1)
        .max_system_wait(Duration::from_millis(100));
    let sched = Scheduler::new(clock, config).expect("scheduler construction");
    sched.stop_processing();
    sched
}

fn bench_asap_submission(c: &mut Criterion) {
    let sched = frozen_sched();
    let mut drained = Vec::with_capacity(1024);

    c.bench_function("asap_submit_1000_drain", |b| {
        b.iter_batched(
            || (),
            |_| {
                for _ in 0..1000 {
                    let _ = sched.execute(|| {});
                }
                drained.clear();
                sched.drain_pending_asap_runnables_into(&mut drained);
                assert_eq!(drained.len(), 1000);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_timed_submission(c: &mut Criterion) {
    let sched = frozen_sched();
    let mut drained = Vec::with_capacity(1024);

    c.bench_function("timed_submit_1000_interleaved_drain", |b| {
        b.iter_batched(
            || (),
            |_| {
                // Alternate far/near deadlines to exercise heap reordering
                for i in 0..1000i64 {
                    let t = if i % 2 == 0 { i * 1_000 } else { (1000 - i) * 1_000 };
                    let _ = sched.execute_at_ns(|| {}, t);
                }
                drained.clear();
                sched.drain_pending_timed_runnables_into(&mut drained);
                assert_eq!(drained.len(), 1000);
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_asap_submission, bench_timed_submission);
criterion_main!(benches);
