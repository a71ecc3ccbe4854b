//! Basic vtsched example
//!
//! Submits ASAP and timed tasks against the wall clock, then shuts down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vtsched::{FnTask, Scheduler, SchedulerConfig, SystemClock};

fn main() {
    env_logger::init();

    println!("=== vtsched basic example ===\n");

    let clock = Arc::new(SystemClock::new());
    let config = SchedulerConfig::default()
        .nbr_of_threads(2)
        .max_system_wait(Duration::from_millis(100));
    let sched = Scheduler::new(clock, config).expect("scheduler construction");

    let completed = Arc::new(AtomicUsize::new(0));

    // ASAP tasks run in submission order
    for i in 0..3 {
        let c = completed.clone();
        let outcome = sched.execute(move || {
            println!("[asap {}] ran", i);
            c.fetch_add(1, Ordering::SeqCst);
        });
        println!("submitted asap {}: {:?}", i, outcome);
    }

    // Timed tasks run when their theoretical time comes
    for (label, delay_ms) in [("late", 300i64), ("early", 100)] {
        let c = completed.clone();
        let outcome = sched.execute_after_ns(
            FnTask::new(
                move || {
                    println!("[timed {}] ran", label);
                    c.fetch_add(1, Ordering::SeqCst);
                },
                move || println!("[timed {}] cancelled", label),
            ),
            delay_ms * 1_000_000,
        );
        println!("submitted timed {}: {:?}", label, outcome);
    }

    while completed.load(Ordering::SeqCst) < 5 {
        std::thread::sleep(Duration::from_millis(10));
    }

    sched.shutdown();
    sched
        .wait_for_no_more_running_worker_system_time_ns(i64::MAX)
        .expect("wait");
    println!("\nall {} tasks completed, workers terminated", 5);
}
